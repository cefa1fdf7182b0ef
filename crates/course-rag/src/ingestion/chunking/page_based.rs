//! Page-boundary chunking

use once_cell::sync::Lazy;
use regex::Regex;

use super::{validate_input, Chunker, EmptyInputError, Passage};

static PAGE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\f|\n{3,}").expect("valid regex"));

/// Splits at form feeds or runs of three or more newlines; short pages are
/// buffered until a full page is emitted
pub struct PageBasedChunker {
    combine_short: bool,
    min_page_chars: usize,
}

impl PageBasedChunker {
    pub fn new(combine_short: bool, min_page_chars: usize) -> Self {
        Self {
            combine_short,
            min_page_chars,
        }
    }
}

impl Default for PageBasedChunker {
    fn default() -> Self {
        Self::new(true, 100)
    }
}

impl Chunker for PageBasedChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Passage>, EmptyInputError> {
        validate_input(text)?;

        let mut passages = Vec::new();
        let mut buffered = String::new();

        for page in PAGE_BREAK.split(text).map(str::trim).filter(|p| !p.is_empty()) {
            if self.combine_short && page.chars().count() < self.min_page_chars {
                buffered.push_str(page);
                buffered.push_str("\n\n");
                continue;
            }
            if !buffered.is_empty() {
                passages.push(Passage::plain(buffered.trim()));
                buffered.clear();
            }
            passages.push(Passage::plain(page));
        }
        if !buffered.is_empty() {
            passages.push(Passage::plain(buffered.trim()));
        }

        Ok(passages)
    }

    fn name(&self) -> &'static str {
        "page_based"
    }
}
