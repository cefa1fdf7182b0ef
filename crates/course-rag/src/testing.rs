//! Fakes and fixtures shared by unit tests

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::{
    EmbeddingProvider, GenerationParams, LlmProvider, ProviderRegistry, StoredTenantSettings,
    TenantStore, TranscriptResolver,
};
use crate::storage::SqliteStore;
use crate::types::{DocumentRecord, VideoRecord};

/// Store whose every call fails, as if the database were unreachable
pub struct FailingStore;

#[async_trait]
impl TenantStore for FailingStore {
    async fn tenant_settings(&self, _tenant_id: i64) -> Result<Option<StoredTenantSettings>> {
        Err(Error::storage("connection refused"))
    }

    async fn documents(&self, _: i64, _: Option<i64>, _: usize) -> Result<Vec<DocumentRecord>> {
        Err(Error::storage("connection refused"))
    }

    async fn videos(&self, _: i64, _: Option<i64>, _: usize) -> Result<Vec<VideoRecord>> {
        Err(Error::storage("connection refused"))
    }

    async fn save_transcript(&self, _: i64, _: &str) -> Result<()> {
        Err(Error::storage("connection refused"))
    }

    async fn save_settings(&self, _: i64, _: &StoredTenantSettings) -> Result<()> {
        Err(Error::storage("connection refused"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Embedder that always fails and counts its calls
#[derive(Default)]
pub struct FailingEmbedder {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::embedding("quota exceeded"))
    }

    fn dimensions(&self) -> Option<usize> {
        None
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// LLM that always fails and counts its calls
#[derive(Default)]
pub struct FailingLlm {
    pub calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for FailingLlm {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::llm("401 unauthorized"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }

    fn name(&self) -> &str {
        "failing"
    }

    fn default_model(&self) -> &str {
        "none"
    }
}

/// LLM that never answers within any reasonable timeout
pub struct StalledLlm;

#[async_trait]
impl LlmProvider for StalledLlm {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(String::new())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "stalled"
    }

    fn default_model(&self) -> &str {
        "stalled"
    }
}

/// LLM returning a fixed answer and counting its calls
pub struct CountingLlm {
    pub answer: String,
    pub calls: AtomicUsize,
}

impl CountingLlm {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for CountingLlm {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "counting"
    }

    fn default_model(&self) -> &str {
        "counting-1"
    }
}

/// Transcriber returning a fixed transcript
pub struct FixedTranscriber(pub String);

#[async_trait]
impl TranscriptResolver for FixedTranscriber {
    async fn transcribe(&self, _media_path: &Path) -> Result<String> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Write `content` under `dir` and return a document record pointing at it
pub fn document_record(dir: &Path, id: i64, filename: &str, content: &str) -> DocumentRecord {
    let path: PathBuf = dir.join(format!("upload-{}", id));
    std::fs::write(&path, content).expect("write fixture");
    DocumentRecord {
        id,
        tenant_id: 1,
        course_id: None,
        filename: filename.to_string(),
        file_path: Some(path),
        uploaded_at: Utc::now(),
    }
}

/// Config for tests: no network providers, local LLM by default
pub fn test_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.llm.ollama_base_url = None;
    config.defaults.llm_provider = "local".to_string();
    config.defaults.llm_model = String::new();
    config
}

/// In-memory store holding one document for tenant 1
pub fn store_with_document(dir: &Path, filename: &str, content: &str) -> SqliteStore {
    let store = SqliteStore::in_memory().expect("in-memory store");
    store
        .insert_document(&document_record(dir, 1, filename, content))
        .expect("insert document");
    store
}

/// Registry built from `config` over `store`
pub fn registry(config: &RagConfig, store: &SqliteStore) -> Arc<ProviderRegistry> {
    Arc::new(ProviderRegistry::from_config(config, Some(store.clone())).expect("registry"))
}
