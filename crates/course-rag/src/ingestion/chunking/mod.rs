//! Chunker set: pure text splitters, one per strategy
//!
//! Every chunker is deterministic for identical input and parameters and
//! rejects empty or whitespace-only input with [`EmptyInputError`].

mod fixed_size;
mod page_based;
mod paragraph;
mod parent_child;
mod recursive;
mod semantic;
mod sentence;

pub use fixed_size::FixedSizeChunker;
pub use page_based::PageBasedChunker;
pub use paragraph::ParagraphChunker;
pub use parent_child::ParentChildChunker;
pub use recursive::RecursiveChunker;
pub use semantic::SemanticChunker;
pub use sentence::SentenceChunker;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ChunkingConfig;
use crate::types::ChunkRelation;

/// Raised when a chunker receives empty or whitespace-only text
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Text cannot be empty")]
pub struct EmptyInputError;

/// One passage produced by a chunker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub text: String,
    pub relation: ChunkRelation,
}

impl Passage {
    /// A passage with no sibling relation
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            relation: ChunkRelation::None,
        }
    }
}

/// A text splitting strategy
pub trait Chunker: Send + Sync {
    /// Split text into ordered passages
    fn chunk(&self, text: &str) -> Result<Vec<Passage>, EmptyInputError>;

    /// Canonical strategy name
    fn name(&self) -> &'static str;
}

/// Canonical chunking strategies
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    FixedSize,
    Paragraph,
    Sentence,
    #[default]
    Semantic,
    PageBased,
    ParentChild,
    Recursive,
}

impl ChunkingStrategy {
    /// All strategies, in declaration order
    pub const ALL: [ChunkingStrategy; 7] = [
        Self::FixedSize,
        Self::Paragraph,
        Self::Sentence,
        Self::Semantic,
        Self::PageBased,
        Self::ParentChild,
        Self::Recursive,
    ];

    /// Normalize a stored or legacy name; unknown names become `Semantic`
    pub fn normalize(name: &str) -> Self {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "fixed_size" | "fixed" | "overlap" => Self::FixedSize,
            "paragraph" => Self::Paragraph,
            "sentence" => Self::Sentence,
            "page_based" | "page" => Self::PageBased,
            "parent_child" => Self::ParentChild,
            "recursive" => Self::Recursive,
            _ => Self::Semantic,
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedSize => "fixed_size",
            Self::Paragraph => "paragraph",
            Self::Sentence => "sentence",
            Self::Semantic => "semantic",
            Self::PageBased => "page_based",
            Self::ParentChild => "parent_child",
            Self::Recursive => "recursive",
        }
    }

    /// Build the chunker for this strategy from configured tunables
    pub fn build(&self, config: &ChunkingConfig) -> Box<dyn Chunker> {
        match self {
            Self::FixedSize => Box::new(FixedSizeChunker::new(
                config.fixed_chunk_words,
                config.fixed_overlap_words,
                config.fixed_min_words,
            )),
            Self::Paragraph => Box::new(ParagraphChunker::new(
                config.paragraph_max_per_chunk,
                config.paragraph_min_chars,
            )),
            Self::Sentence => Box::new(SentenceChunker::new(
                config.sentences_per_chunk,
                config.sentence_overlap,
            )),
            Self::Semantic => Box::new(SemanticChunker::new(
                config.semantic_max_chars,
                config.semantic_detect_headers,
            )),
            Self::PageBased => Box::new(PageBasedChunker::new(
                config.page_combine_short,
                config.page_min_chars,
            )),
            Self::ParentChild => Box::new(ParentChildChunker::new(
                config.parent_words,
                config.child_words,
                config.child_overlap_words,
                config.child_min_words,
            )),
            Self::Recursive => Box::new(RecursiveChunker::new(
                config.recursive_chunk_chars,
                config.recursive_separators.clone(),
            )),
        }
    }
}

impl std::fmt::Display for ChunkingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject empty or whitespace-only text
pub(crate) fn validate_input(text: &str) -> Result<(), EmptyInputError> {
    if text.trim().is_empty() {
        Err(EmptyInputError)
    } else {
        Ok(())
    }
}

/// Overlapping word windows: `(start, window)` pairs stepping by `size - overlap`
pub(crate) fn word_windows<'a>(
    words: &'a [&'a str],
    size: usize,
    overlap: usize,
) -> impl Iterator<Item = (usize, &'a [&'a str])> + 'a {
    let size = size.max(1);
    let step = size.saturating_sub(overlap).max(1);
    (0..words.len())
        .step_by(step)
        .map(move |start| (start, &words[start..(start + size).min(words.len())]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "# Trees\n\nA binary search tree orders nodes by key. Each node has at most two children.\n\nBALANCING\n\nAVL trees rotate after inserts. Red-black trees recolor nodes.\n\n\n\nHeaps are complete binary trees.";

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(ChunkingStrategy::normalize("fixed"), ChunkingStrategy::FixedSize);
        assert_eq!(ChunkingStrategy::normalize("overlap"), ChunkingStrategy::FixedSize);
        assert_eq!(ChunkingStrategy::normalize("page"), ChunkingStrategy::PageBased);
        assert_eq!(ChunkingStrategy::normalize("Parent-Child"), ChunkingStrategy::ParentChild);
        assert_eq!(ChunkingStrategy::normalize("mystery"), ChunkingStrategy::Semantic);
        for strategy in ChunkingStrategy::ALL {
            assert_eq!(ChunkingStrategy::normalize(strategy.as_str()), strategy);
        }
    }

    #[test]
    fn test_every_strategy_rejects_empty_input() {
        let config = ChunkingConfig::default();
        for strategy in ChunkingStrategy::ALL {
            let chunker = strategy.build(&config);
            assert_eq!(chunker.chunk(""), Err(EmptyInputError));
            assert_eq!(chunker.chunk(" \n\t "), Err(EmptyInputError));
            assert_eq!(chunker.name(), strategy.as_str());
        }
    }

    #[test]
    fn test_word_windows() {
        let words: Vec<&str> = (0..10).map(|_| "w").collect();
        let starts: Vec<usize> = word_windows(&words, 4, 1).map(|(s, _)| s).collect();
        assert_eq!(starts, vec![0, 3, 6, 9]);
        let last = word_windows(&words, 4, 1).last().unwrap().1;
        assert_eq!(last.len(), 1);
    }

    #[test]
    fn test_structural_strategies_cover_sample() {
        let config = ChunkingConfig::default();
        for strategy in [
            ChunkingStrategy::Semantic,
            ChunkingStrategy::PageBased,
            ChunkingStrategy::Recursive,
            ChunkingStrategy::Sentence,
        ] {
            let passages = strategy.build(&config).chunk(SAMPLE).unwrap();
            assert!(!passages.is_empty(), "{} produced nothing", strategy);
            let joined: String = passages.iter().map(|p| p.text.as_str()).collect();
            assert!(joined.contains("binary search tree"), "{} lost content", strategy);
        }
    }

    proptest! {
        #[test]
        fn prop_chunking_is_idempotent(text in "[A-Za-z .!?\n]{1,400}") {
            let config = ChunkingConfig::default();
            for strategy in ChunkingStrategy::ALL {
                let chunker = strategy.build(&config);
                let first = chunker.chunk(&text);
                let second = chunker.chunk(&text);
                prop_assert_eq!(first, second);
            }
        }

        #[test]
        fn prop_passages_come_from_input(
            text in "(\n|\n\n|\x0c)*(# )?[a-z]{1,8}(( |\n|\n\n|\n\n\n|\x0c|\n# )[a-z]{1,8}){0,80}"
        ) {
            let config = ChunkingConfig::default();
            let input_words: std::collections::HashSet<&str> = text.split_whitespace().collect();
            for strategy in ChunkingStrategy::ALL {
                let passages = strategy.build(&config).chunk(&text).unwrap();
                for passage in passages {
                    prop_assert!(!passage.text.trim().is_empty());
                    for word in passage.text.split_whitespace() {
                        prop_assert!(input_words.contains(word));
                    }
                }
            }
        }
    }
}
