//! Hierarchical parent/child word windows

use super::{validate_input, word_windows, Chunker, EmptyInputError, Passage};
use crate::types::ChunkRelation;

/// Emits each parent window followed by its overlapping child windows
pub struct ParentChildChunker {
    parent_words: usize,
    child_words: usize,
    child_overlap: usize,
    min_child_words: usize,
}

impl ParentChildChunker {
    pub fn new(
        parent_words: usize,
        child_words: usize,
        child_overlap: usize,
        min_child_words: usize,
    ) -> Self {
        Self {
            parent_words: parent_words.max(1),
            child_words,
            child_overlap,
            min_child_words,
        }
    }
}

impl Default for ParentChildChunker {
    fn default() -> Self {
        Self::new(2000, 400, 50, 50)
    }
}

impl Chunker for ParentChildChunker {
    fn chunk(&self, text: &str) -> Result<Vec<Passage>, EmptyInputError> {
        validate_input(text)?;
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut passages = Vec::new();

        for (parent_index, parent) in words.chunks(self.parent_words).enumerate() {
            passages.push(Passage {
                text: parent.join(" "),
                relation: ChunkRelation::Parent { parent_index },
            });

            let children = word_windows(parent, self.child_words, self.child_overlap)
                .filter(|(_, window)| window.len() >= self.min_child_words)
                .enumerate()
                .map(|(position, (_, window))| Passage {
                    text: window.join(" "),
                    relation: ChunkRelation::Child {
                        parent_index,
                        position,
                    },
                });
            passages.extend(children);
        }

        Ok(passages)
    }

    fn name(&self) -> &'static str {
        "parent_child"
    }
}
