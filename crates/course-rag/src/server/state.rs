//! Application state for the HTTP adapter

use std::sync::Arc;

use crate::config::RagConfig;
use crate::engine::RagEngine;
use crate::error::Result;
use crate::storage::SqliteStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Retrieval and grounding engine
    engine: RagEngine,
}

impl AppState {
    /// Open storage and build the engine from configuration
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing application state (database: {})...",
            config.storage.database_path.display()
        );
        let store = SqliteStore::new(&config.storage.database_path)?;
        tracing::info!("Storage initialized");

        let engine = RagEngine::from_config(&config, store)?;
        tracing::info!(
            "Engine initialized (default LLM: {}, grounding threshold: {})",
            config.defaults.llm_provider,
            config.retrieval.min_grounding_score
        );

        Ok(Self::with_engine(config, engine))
    }

    /// Wrap an already built engine
    pub fn with_engine(config: RagConfig, engine: RagEngine) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, engine }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn engine(&self) -> &RagEngine {
        &self.inner.engine
    }
}
