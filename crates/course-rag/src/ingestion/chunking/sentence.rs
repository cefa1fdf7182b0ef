//! Sentence grouping with overlap

use super::{validate_input, Chunker, EmptyInputError, Passage};

/// Groups `per_chunk` sentences, sharing `overlap` sentences between neighbours
pub struct SentenceChunker {
    per_chunk: usize,
    overlap: usize,
}

impl SentenceChunker {
    pub fn new(per_chunk: usize, overlap: usize) -> Self {
        Self {
            per_chunk: per_chunk.max(1),
            overlap,
        }
    }

    /// Split at `.`, `!` or `?` followed by whitespace and an uppercase ASCII letter
    pub fn split_sentences(text: &str) -> Vec<&str> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < chars.len() {
            let (_, c) = chars[i];
            if matches!(c, '.' | '!' | '?') {
                let mut j = i + 1;
                while j < chars.len() && chars[j].1.is_whitespace() {
                    j += 1;
                }
                if j > i + 1 && j < chars.len() && chars[j].1.is_ascii_uppercase() {
                    sentences.push(&text[start..chars[i + 1].0]);
                    start = chars[j].0;
                    i = j;
                    continue;
                }
            }
            i += 1;
        }
        sentences.push(&text[start..]);

        sentences
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(5, 1)
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Passage>, EmptyInputError> {
        validate_input(text)?;
        let sentences = Self::split_sentences(text);
        let step = self.per_chunk.saturating_sub(self.overlap).max(1);

        Ok((0..sentences.len())
            .step_by(step)
            .map(|start| {
                let end = (start + self.per_chunk).min(sentences.len());
                Passage::plain(sentences[start..end].join(" "))
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "sentence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_requires_capital() {
        let sentences =
            SentenceChunker::split_sentences("Trees are graphs. they have roots! Heaps? Yes.  Done");
        assert_eq!(
            sentences,
            vec!["Trees are graphs. they have roots!", "Heaps?", "Yes.", "Done"]
        );
    }

    #[test]
    fn test_overlap() {
        let text = "One a. Two b. Three c. Four d. Five e.";
        let passages = SentenceChunker::new(2, 1).chunk(text).unwrap();
        let texts: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["One a. Two b.", "Two b. Three c.", "Three c. Four d.", "Four d. Five e.", "Five e."]
        );
    }

    #[test]
    fn test_no_boundary_single_passage() {
        let passages = SentenceChunker::default().chunk("no capitals here. at all").unwrap();
        assert_eq!(passages.len(), 1);
    }
}
