//! Fixed-size word windows with overlap

use super::{validate_input, word_windows, Chunker, EmptyInputError, Passage};

/// Splits text into word windows; windows below `min_words` are dropped
pub struct FixedSizeChunker {
    chunk_words: usize,
    overlap_words: usize,
    min_words: usize,
}

impl FixedSizeChunker {
    pub fn new(chunk_words: usize, overlap_words: usize, min_words: usize) -> Self {
        Self {
            chunk_words,
            overlap_words,
            min_words,
        }
    }
}

impl Default for FixedSizeChunker {
    fn default() -> Self {
        Self::new(500, 50, 50)
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Passage>, EmptyInputError> {
        validate_input(text)?;
        let words: Vec<&str> = text.split_whitespace().collect();

        Ok(word_windows(&words, self.chunk_words, self.overlap_words)
            .filter(|(_, window)| window.len() >= self.min_words)
            .map(|(_, window)| Passage::plain(window.join(" ")))
            .collect())
    }

    fn name(&self) -> &'static str {
        "fixed_size"
    }
}
