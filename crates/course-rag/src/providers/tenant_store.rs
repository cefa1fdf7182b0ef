//! Storage collaborator trait
//!
//! Read-only from the engine's point of view, apart from persisting a newly
//! resolved video transcript. Settings writes come from the admin route.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{DocumentRecord, VideoRecord};

/// A tenant's stored retrieval preferences, exactly as persisted (raw names)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredTenantSettings {
    pub chunking_strategy: Option<String>,
    pub retrieval_strategy: Option<String>,
    pub vector_store: Option<String>,
    pub embedding_provider: Option<String>,
    pub embedding_model: Option<String>,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Tenant settings and course material metadata
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Stored settings row, `None` when the tenant has none
    async fn tenant_settings(&self, tenant_id: i64) -> Result<Option<StoredTenantSettings>>;

    /// Most recently uploaded documents first
    async fn documents(
        &self,
        tenant_id: i64,
        course_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<DocumentRecord>>;

    /// Most recently created videos first
    async fn videos(
        &self,
        tenant_id: i64,
        course_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<VideoRecord>>;

    /// Persist a resolved transcript
    async fn save_transcript(&self, video_id: i64, transcript: &str) -> Result<()>;

    /// Insert or replace a tenant's settings row
    async fn save_settings(&self, tenant_id: i64, settings: &StoredTenantSettings) -> Result<()>;

    /// Check if the store is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get store name for logging
    fn name(&self) -> &str;
}
