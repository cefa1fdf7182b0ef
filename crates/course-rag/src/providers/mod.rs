//! Capability ports and their implementations
//!
//! The retrieval engine depends only on the traits defined here. Concrete
//! implementations are registered by name in a [`ProviderRegistry`] at
//! start-up and resolved per request from the tenant's configuration.

pub mod embedding;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod registry;
pub mod tenant_store;
pub mod transcript;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{GenerationParams, LlmProvider};
pub use local::{ExtractiveLlm, HashingEmbedder, InMemoryVectorStore, MockLlm};
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
pub use registry::{ProviderRegistry, RegistrySummary};
pub use tenant_store::{StoredTenantSettings, TenantStore};
pub use transcript::{NoTranscription, TranscriptResolver};
pub use vector_store::{
    content_hash, EphemeralVectorStore, IndexEntry, IndexHit, IndexScope, VectorIndexProvider,
};
