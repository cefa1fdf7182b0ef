//! Configuration for the retrieval engine
//!
//! Every section has a `Default`, so a TOML file only needs the keys it
//! changes. `RAG_*` environment variables are applied on top of the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Retrieval and grounding parameters
    pub retrieval: RetrievalConfig,
    /// Chunker tunables
    pub chunking: ChunkingConfig,
    /// Cache TTLs and capacities
    pub cache: CacheConfig,
    /// LLM configuration
    pub llm: LlmConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Process-wide tenant defaults, used when a tenant has no settings row
    pub defaults: TenantDefaults,
}

impl RagConfig {
    /// Load configuration from an optional TOML file, then apply `RAG_*` env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RAG_CHUNKING_STRATEGY") {
            self.defaults.chunking_strategy = v;
        }
        if let Some(v) = get("RAG_RETRIEVAL_STRATEGY") {
            self.defaults.retrieval_strategy = v;
        }
        if let Some(v) = get("RAG_LLM_PROVIDER") {
            self.defaults.llm_provider = v;
        }
        if let Some(v) = get("RAG_VECTOR_STORE") {
            self.defaults.vector_store = v;
        }
        if let Some(v) = get("RAG_EMBEDDING_PROVIDER") {
            self.defaults.embedding_provider = v;
        }
        if let Some(v) = get("RAG_MIN_GROUNDING_SCORE") {
            match v.parse::<f32>() {
                Ok(score) => self.retrieval.min_grounding_score = score.clamp(0.0, 1.0),
                Err(_) => tracing::warn!("Ignoring invalid RAG_MIN_GROUNDING_SCORE: {}", v),
            }
        }
        if let Some(v) = get("RAG_OLLAMA_URL") {
            self.llm.ollama_base_url = Some(v);
        }
        if let Some(v) = get("RAG_DATABASE_PATH") {
            self.storage.database_path = PathBuf::from(v);
        }
        if let Some(v) = get("RAG_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("RAG_PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid RAG_PORT: {}", v),
            }
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum request body size in bytes
    pub max_body_bytes: usize,
    /// Outer request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_body_bytes: 64 * 1024,
            request_timeout_secs: 120,
        }
    }
}

/// Retrieval and grounding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Most recent documents collected per request
    pub max_documents: usize,
    /// Most recent videos collected per request
    pub max_videos: usize,
    /// Upper bound on candidate chunks per request
    pub max_chunks: usize,
    /// Snippet length in characters
    pub snippet_chars: usize,
    /// Characters kept when a source cannot be chunked
    pub fallback_chars: usize,
    /// Maximum query tokens used for keyword scoring
    pub max_query_tokens: usize,
    /// Keyword score ceiling
    pub keyword_cap: f32,
    /// Weight of the semantic signal under hybrid retrieval
    pub semantic_weight: f32,
    /// Weight of the keyword signal under hybrid retrieval
    pub keyword_weight: f32,
    /// Minimum combined score a chunk needs to ground an answer
    pub min_grounding_score: f32,
    /// Retriever top-k ceiling
    pub max_top_k: usize,
    /// Caller-facing top-k ceiling
    pub max_request_top_k: usize,
    /// Top-k used when the caller omits one
    pub default_top_k: usize,
    /// Neighbours requested from an ephemeral vector store
    pub ephemeral_neighbours: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_documents: 20,
            max_videos: 20,
            max_chunks: 180,
            snippet_chars: 380,
            fallback_chars: 2000,
            max_query_tokens: 8,
            keyword_cap: 0.95,
            semantic_weight: 0.65,
            keyword_weight: 0.35,
            min_grounding_score: 0.18,
            max_top_k: 12,
            max_request_top_k: 25,
            default_top_k: 5,
            ephemeral_neighbours: 30,
        }
    }
}

/// Chunker tunables, one group per strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Fixed-size window in words
    pub fixed_chunk_words: usize,
    /// Fixed-size overlap in words
    pub fixed_overlap_words: usize,
    /// Fixed-size windows below this many words are dropped
    pub fixed_min_words: usize,
    /// Paragraphs per chunk
    pub paragraph_max_per_chunk: usize,
    /// Paragraphs shorter than this many characters are discarded
    pub paragraph_min_chars: usize,
    /// Sentences per chunk
    pub sentences_per_chunk: usize,
    /// Sentences shared between consecutive chunks
    pub sentence_overlap: usize,
    /// Semantic chunk budget in characters
    pub semantic_max_chars: usize,
    /// Open a new semantic chunk at detected headers
    pub semantic_detect_headers: bool,
    /// Pages shorter than this many characters are buffered
    pub page_min_chars: usize,
    /// Merge short pages with their neighbours
    pub page_combine_short: bool,
    /// Parent window in words
    pub parent_words: usize,
    /// Child window in words
    pub child_words: usize,
    /// Child overlap in words
    pub child_overlap_words: usize,
    /// Children below this many words are dropped
    pub child_min_words: usize,
    /// Recursive chunk budget in characters
    pub recursive_chunk_chars: usize,
    /// Recursive separators, coarsest first
    pub recursive_separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            fixed_chunk_words: 500,
            fixed_overlap_words: 50,
            fixed_min_words: 50,
            paragraph_max_per_chunk: 5,
            paragraph_min_chars: 50,
            sentences_per_chunk: 5,
            sentence_overlap: 1,
            semantic_max_chars: 1000,
            semantic_detect_headers: true,
            page_min_chars: 100,
            page_combine_short: true,
            parent_words: 2000,
            child_words: 400,
            child_overlap_words: 50,
            child_min_words: 50,
            recursive_chunk_chars: 1000,
            recursive_separators: ["\n\n\n", "\n\n", "\n", ". ", " "]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Answer TTL in seconds
    pub answer_ttl_secs: u64,
    /// In-process answer entries before the oldest is evicted
    pub answer_max_entries: usize,
    /// Tenant configuration TTL in seconds
    pub tenant_config_ttl_secs: u64,
    /// Shared answer cache database (disabled when unset)
    pub shared_cache_path: Option<PathBuf>,
    /// Memoized document extractions kept in memory
    pub extraction_memo_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            answer_ttl_secs: 90,
            answer_max_entries: 1024,
            tenant_config_ttl_secs: 45,
            shared_cache_path: None,
            extraction_memo_entries: 256,
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Ollama base URL; the Ollama providers are registered only when set
    pub ollama_base_url: Option<String>,
    /// Model used when a tenant names none
    pub default_model: String,
    /// Timeout for a single LLM call in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: Some("http://localhost:11434".to_string()),
            default_model: "phi3".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Dimensions of the local hashing embedder
    pub dimensions: usize,
    /// Provider tried once when the tenant's provider fails
    pub fallback_provider: String,
    /// Model reported for the fallback provider
    pub fallback_model: String,
    /// Ollama embedding model
    pub ollama_model: String,
    /// Timeout for a single embedding call in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 384,
            fallback_provider: "sentence_transformer".to_string(),
            fallback_model: "all-MiniLM-L6-v2".to_string(),
            ollama_model: "nomic-embed-text".to_string(),
            timeout_secs: 20,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding tenant settings, documents, videos and the chunk index
    pub database_path: PathBuf,
    /// Register the SQL nearest-neighbour index
    pub vector_index_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let database_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("course-rag")
            .join("course_rag.db");

        Self {
            database_path,
            vector_index_enabled: true,
        }
    }
}

/// Tenant defaults, as raw names (normalized by the tenant resolver)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantDefaults {
    pub chunking_strategy: String,
    pub retrieval_strategy: String,
    pub vector_store: String,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for TenantDefaults {
    fn default() -> Self {
        Self {
            chunking_strategy: "semantic".to_string(),
            retrieval_strategy: "hybrid".to_string(),
            vector_store: "postgres".to_string(),
            embedding_provider: "sentence_transformer".to_string(),
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            llm_provider: "ollama".to_string(),
            llm_model: "phi3".to_string(),
            temperature: 0.2,
            max_tokens: 700,
        }
    }
}
