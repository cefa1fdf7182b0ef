//! Named provider implementations, resolved per request

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RagConfig;
use crate::error::Result;
use crate::storage::{SqliteStore, SqliteVectorIndex};

use super::local::{ExtractiveLlm, HashingEmbedder, InMemoryVectorStore, MockLlm};
use super::ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
use super::{EmbeddingProvider, EphemeralVectorStore, LlmProvider, VectorIndexProvider};

/// Ephemeral store names served by the in-memory implementation
const IN_MEMORY_STORE_NAMES: [&str; 5] = ["memory", "chroma", "qdrant", "faiss", "pinecone"];

/// Provider implementations keyed by lowercase name
///
/// Built once at start-up; lookups are read-only afterwards.
pub struct ProviderRegistry {
    embedders: HashMap<String, Arc<dyn EmbeddingProvider>>,
    llms: HashMap<String, Arc<dyn LlmProvider>>,
    vector_indexes: HashMap<String, Arc<dyn VectorIndexProvider>>,
    vector_stores: HashMap<String, Arc<dyn EphemeralVectorStore>>,
    default_embedder: String,
}

/// Registered names, for the info endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySummary {
    pub embedders: Vec<String>,
    pub llms: Vec<String>,
    pub vector_indexes: Vec<String>,
    pub vector_stores: Vec<String>,
    pub default_embedder: String,
}

impl ProviderRegistry {
    /// Empty registry whose fixed fallback embedder is `default_embedder`
    pub fn new(default_embedder: impl Into<String>) -> Self {
        Self {
            embedders: HashMap::new(),
            llms: HashMap::new(),
            vector_indexes: HashMap::new(),
            vector_stores: HashMap::new(),
            default_embedder: default_embedder.into().to_lowercase(),
        }
    }

    /// Register the bundled implementations
    ///
    /// The hashing embedder serves `local` and the configured fallback name.
    /// Ollama is registered only when a base URL is configured. The SQL index
    /// needs the storage handle.
    pub fn from_config(config: &RagConfig, store: Option<SqliteStore>) -> Result<Self> {
        let mut registry = Self::new(&config.embeddings.fallback_provider);

        let hashing: Arc<dyn EmbeddingProvider> =
            Arc::new(HashingEmbedder::new(config.embeddings.dimensions));
        registry.register_embedder("local", Arc::clone(&hashing));
        registry.register_embedder(&config.embeddings.fallback_provider, hashing);

        let extractive: Arc<dyn LlmProvider> = Arc::new(ExtractiveLlm);
        registry.register_llm("local", extractive);
        registry.register_llm("mock", Arc::new(MockLlm));

        if let Some(base_url) = config
            .llm
            .ollama_base_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
        {
            let llm_client = Arc::new(OllamaClient::new(
                base_url,
                Duration::from_secs(config.llm.timeout_secs),
            )?);
            let embed_client = Arc::new(OllamaClient::new(
                base_url,
                Duration::from_secs(config.embeddings.timeout_secs),
            )?);
            registry.register_llm(
                "ollama",
                Arc::new(OllamaLlm::new(llm_client, &config.llm.default_model)),
            );
            registry.register_embedder(
                "ollama",
                Arc::new(OllamaEmbedder::new(embed_client, &config.embeddings.ollama_model)),
            );
            tracing::info!("Registered Ollama providers at {}", base_url);
        }

        if config.storage.vector_index_enabled {
            if let Some(store) = store {
                registry.register_vector_index("postgres", Arc::new(SqliteVectorIndex::new(store)));
            }
        }

        let memory: Arc<dyn EphemeralVectorStore> = Arc::new(InMemoryVectorStore::new());
        for name in IN_MEMORY_STORE_NAMES {
            registry.register_vector_store(name, Arc::clone(&memory));
        }

        Ok(registry)
    }

    pub fn register_embedder(&mut self, name: &str, provider: Arc<dyn EmbeddingProvider>) {
        self.embedders.insert(name.trim().to_lowercase(), provider);
    }

    pub fn register_llm(&mut self, name: &str, provider: Arc<dyn LlmProvider>) {
        self.llms.insert(name.trim().to_lowercase(), provider);
    }

    pub fn register_vector_index(&mut self, name: &str, provider: Arc<dyn VectorIndexProvider>) {
        self.vector_indexes.insert(name.trim().to_lowercase(), provider);
    }

    pub fn register_vector_store(&mut self, name: &str, provider: Arc<dyn EphemeralVectorStore>) {
        self.vector_stores.insert(name.trim().to_lowercase(), provider);
    }

    pub fn embedder(&self, name: &str) -> Option<Arc<dyn EmbeddingProvider>> {
        self.embedders.get(&name.trim().to_lowercase()).cloned()
    }

    pub fn llm(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.llms.get(&name.trim().to_lowercase()).cloned()
    }

    pub fn vector_index(&self, name: &str) -> Option<Arc<dyn VectorIndexProvider>> {
        self.vector_indexes.get(&name.trim().to_lowercase()).cloned()
    }

    pub fn vector_store(&self, name: &str) -> Option<Arc<dyn EphemeralVectorStore>> {
        self.vector_stores.get(&name.trim().to_lowercase()).cloned()
    }

    /// Name of the fixed fallback embedder
    pub fn default_embedder_name(&self) -> &str {
        &self.default_embedder
    }

    /// The fixed fallback embedder, if registered
    pub fn default_embedder(&self) -> Option<Arc<dyn EmbeddingProvider>> {
        self.embedder(&self.default_embedder)
    }

    /// Registered names, sorted
    pub fn summary(&self) -> RegistrySummary {
        fn sorted<V>(map: &HashMap<String, V>) -> Vec<String> {
            let mut names: Vec<String> = map.keys().cloned().collect();
            names.sort();
            names
        }
        RegistrySummary {
            embedders: sorted(&self.embedders),
            llms: sorted(&self.llms),
            vector_indexes: sorted(&self.vector_indexes),
            vector_stores: sorted(&self.vector_stores),
            default_embedder: self.default_embedder.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_registers_bundled_providers() {
        let mut config = RagConfig::default();
        config.llm.ollama_base_url = None;
        let registry =
            ProviderRegistry::from_config(&config, Some(SqliteStore::in_memory().unwrap())).unwrap();

        assert!(registry.embedder("local").is_some());
        assert!(registry.embedder("Sentence_Transformer").is_some());
        assert!(registry.default_embedder().is_some());
        assert!(registry.embedder("ollama").is_none());
        assert!(registry.llm("mock").is_some());
        assert!(registry.vector_index("postgres").is_some());
        assert!(registry.vector_store("chroma").is_some());
        assert!(registry.vector_store("weaviate").is_none());
    }

    #[test]
    fn test_ollama_registered_when_configured() {
        let config = RagConfig::default();
        let registry = ProviderRegistry::from_config(&config, None).unwrap();
        assert_eq!(registry.llm("ollama").unwrap().default_model(), "phi3");
        assert!(registry.embedder("ollama").is_some());
        assert!(registry.vector_index("postgres").is_none());

        let summary = registry.summary();
        assert_eq!(summary.default_embedder, "sentence_transformer");
        assert!(summary.llms.contains(&"local".to_string()));
    }
}
