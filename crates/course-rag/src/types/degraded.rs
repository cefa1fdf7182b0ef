//! Degradations observed while answering a request

use serde::{Deserialize, Serialize};
use std::fmt;

/// A dependency that failed without failing the request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DegradedReason {
    /// The tenant's embedding provider failed or is not registered
    EmbeddingProviderUnavailable(String),
    /// The default embedding provider failed too; no semantic scores
    EmbeddingFallbackFailed(String),
    /// The persistent vector index failed or returned nothing
    VectorIndexUnavailable(String),
    /// The ephemeral vector store failed or returned nothing
    VectorStoreUnavailable(String),
    /// The configured LLM failed; the local summarizer answered
    LlmUnavailable(String),
    /// A video had no usable transcript
    TranscriptUnavailable(String),
    /// The shared answer cache tier could not be read or written
    SharedCacheUnavailable(String),
}

impl DegradedReason {
    /// Whether the degradation is worth surfacing to the caller as a warning
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            Self::TranscriptUnavailable(_) | Self::SharedCacheUnavailable(_)
        )
    }
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmbeddingProviderUnavailable(d) => write!(f, "embedding provider unavailable: {}", d),
            Self::EmbeddingFallbackFailed(d) => write!(f, "embedding fallback failed: {}", d),
            Self::VectorIndexUnavailable(d) => write!(f, "vector index unavailable: {}", d),
            Self::VectorStoreUnavailable(d) => write!(f, "vector store unavailable: {}", d),
            Self::LlmUnavailable(d) => write!(f, "LLM unavailable: {}", d),
            Self::TranscriptUnavailable(d) => write!(f, "transcript unavailable: {}", d),
            Self::SharedCacheUnavailable(d) => write!(f, "shared cache unavailable: {}", d),
        }
    }
}
