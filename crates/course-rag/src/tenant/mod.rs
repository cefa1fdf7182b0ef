//! Per-tenant retrieval configuration
//!
//! Stored names are free-form and include legacy aliases. Everything is
//! normalized to a canonical set here, before any component sees it.

mod resolver;

pub use resolver::TenantConfigResolver;

use serde::{Deserialize, Serialize};

use crate::config::TenantDefaults;
use crate::ingestion::chunking::ChunkingStrategy;
use crate::providers::StoredTenantSettings;

/// Canonical default embedding model of the sentence-transformer provider
pub const DEFAULT_SENTENCE_MODEL: &str = "all-MiniLM-L6-v2";

/// How candidate chunks are scored
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Query-token overlap only
    Keyword,
    /// Vector similarity only
    Semantic,
    /// Weighted blend of both
    #[default]
    Hybrid,
}

impl RetrievalStrategy {
    /// Normalize a stored or legacy name; unknown names become `Hybrid`
    pub fn normalize(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "keyword" | "bm25" | "lexical" => Self::Keyword,
            "semantic" | "vector" | "dense" => Self::Semantic,
            _ => Self::Hybrid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }

    /// Whether semantic scores are needed
    pub fn uses_semantic(&self) -> bool {
        !matches!(self, Self::Keyword)
    }
}

/// Where semantic search runs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreKind {
    /// Precomputed SQL nearest-neighbour index
    #[default]
    Postgres,
    Chroma,
    Qdrant,
    Faiss,
    Pinecone,
    /// Plain in-memory cosine scoring
    Memory,
}

impl VectorStoreKind {
    /// Normalize a stored or legacy name; unknown names become `Postgres`
    pub fn normalize(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "postgres" | "pgvector" | "postgresql" | "sql" | "sqlite" => Self::Postgres,
            "chroma" | "chromadb" => Self::Chroma,
            "qdrant" => Self::Qdrant,
            "faiss" => Self::Faiss,
            "pinecone" => Self::Pinecone,
            "memory" | "in_memory" | "inmemory" => Self::Memory,
            _ => Self::Postgres,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Chroma => "chroma",
            Self::Qdrant => "qdrant",
            Self::Faiss => "faiss",
            Self::Pinecone => "pinecone",
            Self::Memory => "memory",
        }
    }
}

/// Resolve the embedding provider and model from raw stored values
///
/// An empty provider is inferred from the model name; if it is still empty
/// the default provider is used.
pub fn resolve_embedding_choice(
    provider_raw: Option<&str>,
    model_raw: Option<&str>,
    default_provider: &str,
) -> (String, Option<String>) {
    let mut provider = provider_raw.unwrap_or("").trim().to_lowercase();
    let mut model = model_raw
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    if provider.is_empty() {
        if let Some(m) = model.as_deref() {
            let lowered = m.to_lowercase();
            if is_minilm(&lowered) {
                provider = "sentence_transformer".to_string();
            } else if lowered.starts_with("text-embedding") || lowered == "openai" {
                provider = "openai".to_string();
            } else if lowered.starts_with("embed-") || lowered == "cohere" {
                provider = "cohere".to_string();
            }
        }
    }
    if provider.is_empty() {
        provider = default_provider.trim().to_lowercase();
    }
    if provider.is_empty() {
        provider = "sentence_transformer".to_string();
    }
    provider = match provider.as_str() {
        "sentence-transformers" | "sentence_transformers" | "sentence-transformer" => {
            "sentence_transformer".to_string()
        }
        _ => provider,
    };

    if provider == "sentence_transformer" {
        let canonical = match model.as_deref() {
            None => true,
            Some(m) => is_minilm(&m.to_lowercase()),
        };
        if canonical {
            model = Some(DEFAULT_SENTENCE_MODEL.to_string());
        }
    }

    (provider, model)
}

fn is_minilm(lowered: &str) -> bool {
    matches!(lowered, "minilm" | "all-minilm-l6-v2")
}

/// Effective retrieval configuration of one tenant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantRetrievalConfig {
    pub chunking_strategy: ChunkingStrategy,
    pub retrieval_strategy: RetrievalStrategy,
    pub vector_store: VectorStoreKind,
    pub embedding_provider: String,
    pub embedding_model: Option<String>,
    pub llm_provider: String,
    pub llm_model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl TenantRetrievalConfig {
    /// Process-wide defaults
    pub fn from_defaults(defaults: &TenantDefaults) -> Self {
        Self::from_stored(&StoredTenantSettings::default(), defaults)
    }

    /// Merge a stored row over the defaults and normalize every name
    pub fn from_stored(stored: &StoredTenantSettings, defaults: &TenantDefaults) -> Self {
        fn pick<'a>(stored: &'a Option<String>, default: &'a str) -> &'a str {
            stored
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
        }
        fn non_empty(value: &str) -> Option<String> {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }

        let has_stored_embedding = stored
            .embedding_provider
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
            || stored
                .embedding_model
                .as_deref()
                .is_some_and(|m| !m.trim().is_empty());
        let (embedding_provider, embedding_model) = if has_stored_embedding {
            resolve_embedding_choice(
                stored.embedding_provider.as_deref(),
                stored.embedding_model.as_deref(),
                &defaults.embedding_provider,
            )
        } else {
            resolve_embedding_choice(
                Some(&defaults.embedding_provider),
                Some(&defaults.embedding_model),
                &defaults.embedding_provider,
            )
        };

        let llm_provider = pick(&stored.llm_provider, &defaults.llm_provider)
            .to_lowercase();
        let llm_model = match stored.llm_model.as_deref().and_then(non_empty) {
            Some(model) => Some(model),
            // a stored provider without a model uses that provider's default
            None if stored.llm_provider.as_deref().and_then(non_empty).is_some() => None,
            None => non_empty(&defaults.llm_model),
        };

        Self {
            chunking_strategy: ChunkingStrategy::normalize(pick(
                &stored.chunking_strategy,
                &defaults.chunking_strategy,
            )),
            retrieval_strategy: RetrievalStrategy::normalize(pick(
                &stored.retrieval_strategy,
                &defaults.retrieval_strategy,
            )),
            vector_store: VectorStoreKind::normalize(pick(
                &stored.vector_store,
                &defaults.vector_store,
            )),
            embedding_provider,
            embedding_model,
            llm_provider,
            llm_model,
            temperature: stored
                .temperature
                .filter(|t| t.is_finite())
                .unwrap_or(defaults.temperature)
                .clamp(0.0, 2.0),
            max_tokens: stored
                .max_tokens
                .unwrap_or(defaults.max_tokens)
                .clamp(16, 8192),
        }
    }
}
