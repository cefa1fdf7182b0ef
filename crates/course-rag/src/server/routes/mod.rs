//! API routes for the retrieval server

pub mod ask;
pub mod tenants;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::cache::CacheStats;
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        // Question answering
        .route("/ask", post(ask::ask))
        // Tenant administration
        .route("/tenants/:id/config", get(tenants::get_config))
        .route("/tenants/:id/config/invalidate", post(tenants::invalidate_config))
        .route("/tenants/:id/settings", put(tenants::put_settings))
        .route("/tenants/:id/reindex", post(tenants::reindex))
        // Answer cache
        .route("/cache/stats", get(cache_stats))
        .route("/cache", delete(clear_cache))
        // Info
        .route("/info", get(info))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}

/// GET /api/cache/stats
async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.engine().cache().stats())
}

/// DELETE /api/cache - Drop every local cache entry
async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.engine().cache().clear();
    tracing::info!("Answer cache cleared");
    StatusCode::NO_CONTENT
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let engine = state.engine();
    let params = engine.retrieval_params();
    Json(serde_json::json!({
        "name": "course-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Tenant-scoped retrieval and grounding over course materials",
        "providers": engine.registry().summary(),
        "defaults": engine.resolver().default_config(),
        "retrieval": {
            "minGroundingScore": params.min_grounding_score,
            "semanticWeight": params.semantic_weight,
            "keywordWeight": params.keyword_weight,
            "defaultTopK": params.default_top_k,
            "maxRequestTopK": params.max_request_top_k,
            "maxTopK": params.max_top_k,
            "maxChunks": params.max_chunks
        },
        "endpoints": {
            "POST /api/ask": "Answer a question from course materials",
            "GET /api/tenants/:id/config": "Effective tenant configuration",
            "POST /api/tenants/:id/config/invalidate": "Drop cached tenant configuration and answers",
            "PUT /api/tenants/:id/settings": "Persist tenant settings",
            "POST /api/tenants/:id/reindex": "Precompute chunk embeddings",
            "GET /api/cache/stats": "Answer cache statistics",
            "DELETE /api/cache": "Clear the answer cache"
        }
    }))
}
