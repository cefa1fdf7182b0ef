//! Recursive separator splitting

use super::{validate_input, Chunker, EmptyInputError, Passage};

/// Splits on the coarsest separator first and recurses into any segment
/// still over the character budget
pub struct RecursiveChunker {
    chunk_chars: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    pub fn new(chunk_chars: usize, separators: Vec<String>) -> Self {
        Self {
            chunk_chars,
            separators,
        }
    }

    fn split<'a>(&self, text: &'a str, separator: &str) -> Vec<&'a str> {
        if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).collect()
        }
    }

    fn recursive_split(&self, text: &str, separators: &[String], out: &mut Vec<String>) {
        let Some((separator, rest)) = separators.split_first() else {
            out.push(text.to_string());
            return;
        };

        let mut current = String::new();
        let mut current_len = 0usize;

        for piece in self.split(text, separator) {
            let piece_len = piece.chars().count();

            if current_len + piece_len > self.chunk_chars && !current.is_empty() {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }

            if piece_len > self.chunk_chars {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                self.recursive_split(piece, rest, out);
            } else {
                if !current.is_empty() {
                    current.push_str(separator);
                    current_len += separator.chars().count();
                }
                current.push_str(piece);
                current_len += piece_len;
            }
        }

        if !current.is_empty() {
            out.push(current);
        }
    }
}

impl Default for RecursiveChunker {
    fn default() -> Self {
        Self::new(
            1000,
            ["\n\n\n", "\n\n", "\n", ". ", " "]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Passage>, EmptyInputError> {
        validate_input(text)?;
        let mut pieces = Vec::new();
        self.recursive_split(text, &self.separators, &mut pieces);

        Ok(pieces
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(Passage::plain)
            .collect())
    }

    fn name(&self) -> &'static str {
        "recursive"
    }
}
