//! Paragraph grouping

use once_cell::sync::Lazy;
use regex::Regex;

use super::{validate_input, Chunker, EmptyInputError, Passage};

static BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

/// Groups up to `max_per_chunk` paragraphs; paragraphs shorter than
/// `min_chars` are discarded, not merged
pub struct ParagraphChunker {
    max_per_chunk: usize,
    min_chars: usize,
}

impl ParagraphChunker {
    pub fn new(max_per_chunk: usize, min_chars: usize) -> Self {
        Self {
            max_per_chunk: max_per_chunk.max(1),
            min_chars,
        }
    }
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self::new(5, 50)
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Passage>, EmptyInputError> {
        validate_input(text)?;

        let mut passages = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        let paragraphs = BLANK_LINE
            .split(text)
            .map(str::trim)
            .filter(|p| p.chars().count() >= self.min_chars.max(1));

        for paragraph in paragraphs {
            current.push(paragraph);
            if current.len() >= self.max_per_chunk {
                passages.push(Passage::plain(current.join("\n\n")));
                current.clear();
            }
        }
        if !current.is_empty() {
            passages.push(Passage::plain(current.join("\n\n")));
        }

        Ok(passages)
    }

    fn name(&self) -> &'static str {
        "paragraph"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(tag: &str) -> String {
        format!("{} {}", tag, "lorem ipsum dolor sit amet ".repeat(3))
    }

    #[test]
    fn test_groups_and_flushes() {
        let text = (0..7).map(|i| para(&format!("P{}", i))).collect::<Vec<_>>().join("\n\n");
        let passages = ParagraphChunker::new(5, 50).chunk(&text).unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].text.matches("\n\n").count(), 4);
        assert!(passages[1].text.starts_with("P5"));
    }

    #[test]
    fn test_short_paragraphs_discarded() {
        let text = format!("tiny\n  \n{}\n\nalso tiny", para("Long"));
        let passages = ParagraphChunker::default().chunk(&text).unwrap();
        assert_eq!(passages.len(), 1);
        assert!(passages[0].text.starts_with("Long"));
        assert!(!passages[0].text.contains("tiny"));
    }
}
