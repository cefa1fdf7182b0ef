//! Header- and budget-aware sectioning

use once_cell::sync::Lazy;
use regex::Regex;

use super::{validate_input, Chunker, EmptyInputError, Passage};

static MARKDOWN_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+").expect("valid regex"));
static NUMBERED_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.(\d+\.)*\s+").expect("valid regex"));

/// Opens a new passage at detected headers or when the character budget
/// would be exceeded
pub struct SemanticChunker {
    max_chars: usize,
    detect_headers: bool,
}

impl SemanticChunker {
    pub fn new(max_chars: usize, detect_headers: bool) -> Self {
        Self {
            max_chars,
            detect_headers,
        }
    }

    /// Markdown headers, numbered headers, and short ALL-CAPS lines
    pub fn is_header(line: &str) -> bool {
        let line = line.trim();
        let len = line.chars().count();
        if len < 3 {
            return false;
        }
        if MARKDOWN_HEADER.is_match(line) || NUMBERED_HEADER.is_match(line) {
            return true;
        }
        len >= 4
            && line.chars().any(char::is_uppercase)
            && !line.chars().any(char::is_lowercase)
            && line.split_whitespace().count() <= 10
    }
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new(1000, true)
    }
}

impl Chunker for SemanticChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Passage>, EmptyInputError> {
        validate_input(text)?;

        let mut passages = Vec::new();
        let mut section: Vec<&str> = Vec::new();
        let mut size = 0usize;

        for line in text.split('\n') {
            let line_len = line.chars().count();
            let boundary = (self.detect_headers && Self::is_header(line))
                || size + line_len > self.max_chars;

            if boundary && !section.is_empty() {
                push_section(&mut passages, &section);
                section.clear();
                size = 0;
            }
            section.push(line);
            size += line_len;
        }
        push_section(&mut passages, &section);

        Ok(passages)
    }

    fn name(&self) -> &'static str {
        "semantic"
    }
}

/// Blank runs before the first header are not passages
fn push_section(passages: &mut Vec<Passage>, section: &[&str]) {
    let text = section.join("\n");
    if !text.trim().is_empty() {
        passages.push(Passage::plain(text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_detection() {
        assert!(SemanticChunker::is_header("## Binary Trees"));
        assert!(SemanticChunker::is_header("2.1. Rotations"));
        assert!(SemanticChunker::is_header("BALANCED TREES"));
        assert!(!SemanticChunker::is_header("AB"));
        assert!(!SemanticChunker::is_header("Balanced trees rotate."));
        assert!(!SemanticChunker::is_header("1234"));
        assert!(!SemanticChunker::is_header(
            "A B C D E F G H I J K L M N O P"
        ));
    }

    #[test]
    fn test_headers_open_sections() {
        let text = "# Intro\nTrees are graphs.\n# Heaps\nHeaps are trees.";
        let passages = SemanticChunker::default().chunk(text).unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].text, "# Intro\nTrees are graphs.");
        assert_eq!(passages[1].text, "# Heaps\nHeaps are trees.");
    }

    #[test]
    fn test_budget_splits() {
        let line = "x".repeat(40);
        let text = vec![line.as_str(); 5].join("\n");
        let passages = SemanticChunker::new(100, true).chunk(&text).unwrap();
        // 40 + 40 fits, the third line would exceed 100
        assert_eq!(passages.len(), 3);
        assert_eq!(passages[0].text.lines().count(), 2);
    }

    #[test]
    fn test_leading_blank_lines_do_not_form_a_passage() {
        let passages = SemanticChunker::default()
            .chunk("\n\n\n# Intro\nTrees are graphs.")
            .unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "# Intro\nTrees are graphs.");

        let passages = SemanticChunker::new(10, true)
            .chunk("   \n\nshort line")
            .unwrap();
        assert!(passages.iter().all(|p| !p.text.trim().is_empty()));
    }
}
