//! Candidate scoring and hybrid retrieval

pub mod hybrid;
pub mod scoring;

pub use hybrid::{Candidates, HybridRetriever, RetrievalOutcome, SemanticPath};
pub use scoring::{best_snippet, combine, cosine_similarity, keyword_score, tokenize, ScoreWeights};
