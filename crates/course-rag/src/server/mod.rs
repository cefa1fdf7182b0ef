//! HTTP adapter for the retrieval engine

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::engine::Readiness;
use crate::error::{Error, Result};
use state::AppState;

/// Retrieval HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a new server, opening storage and building the engine
    pub fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    /// Create from prepared state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .nest("/api", routes::api_routes(self.config.server.max_body_bytes))
            .with_state(self.state.clone())
            // applied bottom to top
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.server.request_timeout_secs.max(1),
            )))
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting retrieval server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let readiness = state.engine().readiness().await;
    let status = if readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(readiness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::AnswerCache;
    use crate::engine::RagEngine;
    use crate::testing::{registry, store_with_document, test_config};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router(dir: &std::path::Path) -> Router {
        let config = test_config();
        let store = store_with_document(dir, "bst.txt", "A binary search tree orders nodes by key.");
        let engine = RagEngine::new(
            &config,
            Arc::new(store.clone()),
            registry(&config, &store),
            AnswerCache::default(),
        );
        RagServer::with_state(AppState::with_engine(config, engine)).build_router()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(dir.path())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_reports_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(dir.path())
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["storage"], true);
    }

    #[tokio::test]
    async fn test_ask_returns_answer_contract() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path());

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/ask",
                json!({"tenantId": 1, "question": "What is a binary search tree?", "topK": 3}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["grounded"], true);
        assert_eq!(body["topKUsed"], 3);
        assert_eq!(body["cached"], false);
        assert_eq!(body["sources"][0]["source"], "bst.txt");
        assert!(body.get("warning").is_none());

        let again = app
            .oneshot(json_request(
                Method::POST,
                "/api/ask",
                json!({"tenantId": 1, "question": "What is a binary search tree?", "topK": 3}),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(again).await["cached"], true);
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_question() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(dir.path())
            .oneshot(json_request(
                Method::POST,
                "/api/ask",
                json!({"tenantId": 1, "question": "  "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["type"], "invalid_request");
    }

    #[tokio::test]
    async fn test_settings_update_changes_resolved_config() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path());

        let response = app
            .clone()
            .oneshot(json_request(
                Method::PUT,
                "/api/tenants/1/settings",
                json!({"retrievalStrategy": "lexical", "vectorStore": "Qdrant"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["config"]["retrieval_strategy"], "keyword");
        assert_eq!(body["config"]["vector_store"], "qdrant");

        let invalidated = app
            .oneshot(json_request(
                Method::POST,
                "/api/tenants/1/config/invalidate",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(invalidated).await["tenantId"], 1);
    }

    #[tokio::test]
    async fn test_reindex_and_cache_stats() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(dir.path());

        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/tenants/1/reindex", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["chunksIndexed"], 1);

        let stats = app
            .oneshot(Request::get("/api/cache/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(stats.status(), StatusCode::OK);
        assert_eq!(body_json(stats).await["entries"], 0);
    }

    #[tokio::test]
    async fn test_info_lists_providers() {
        let dir = tempfile::tempdir().unwrap();
        let response = router(dir.path())
            .oneshot(Request::get("/api/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["name"], "course-rag");
        assert!(body["providers"]["llms"]
            .as_array()
            .unwrap()
            .contains(&json!("mock")));
    }
}
