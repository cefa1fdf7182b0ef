//! Tenant administration endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::engine::ReindexReport;
use crate::error::Result;
use crate::providers::StoredTenantSettings;
use crate::server::state::AppState;
use crate::tenant::TenantRetrievalConfig;

/// Raw settings as an admin submits them; names are normalized on read
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSettingsRequest {
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

impl From<TenantSettingsRequest> for StoredTenantSettings {
    fn from(req: TenantSettingsRequest) -> Self {
        Self {
            chunking_strategy: req.chunking_strategy,
            retrieval_strategy: req.retrieval_strategy,
            vector_store: req.vector_store,
            embedding_provider: req.embedding_provider,
            embedding_model: req.embedding_model,
            llm_provider: req.llm_provider,
            llm_model: req.llm_model,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        }
    }
}

/// Resolved configuration of one tenant
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfigResponse {
    pub tenant_id: i64,
    pub config: TenantRetrievalConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub tenant_id: i64,
    /// Whether a cached configuration was dropped
    pub invalidated: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexRequest {
    #[serde(default)]
    pub course_id: Option<i64>,
}

/// GET /api/tenants/:id/config - Effective configuration
pub async fn get_config(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
) -> Json<TenantConfigResponse> {
    let config = state.engine().resolver().get(tenant_id).await;
    Json(TenantConfigResponse { tenant_id, config })
}

/// POST /api/tenants/:id/config/invalidate - Drop cached configuration and answers
pub async fn invalidate_config(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
) -> Json<InvalidateResponse> {
    let invalidated = state.engine().invalidate_tenant(tenant_id).await;
    Json(InvalidateResponse {
        tenant_id,
        invalidated,
    })
}

/// PUT /api/tenants/:id/settings - Persist raw settings
pub async fn put_settings(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
    Json(request): Json<TenantSettingsRequest>,
) -> Result<Json<TenantConfigResponse>> {
    tracing::info!("Updating settings for tenant {}", tenant_id);
    let config = state
        .engine()
        .update_settings(tenant_id, request.into())
        .await?;
    Ok(Json(TenantConfigResponse { tenant_id, config }))
}

/// POST /api/tenants/:id/reindex - Precompute chunk embeddings
pub async fn reindex(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
    body: Option<Json<ReindexRequest>>,
) -> Result<Json<ReindexReport>> {
    let course_id = body.and_then(|Json(req)| req.course_id);
    tracing::info!("Reindexing tenant {} course {:?}", tenant_id, course_id);
    let report = state.engine().reindex(tenant_id, course_id).await?;
    Ok(Json(report))
}
