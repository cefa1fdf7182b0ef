//! Question answering endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{AskRequest, AskResponse};

/// POST /api/ask - Answer a question from a tenant's course materials
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let start = Instant::now();
    tracing::info!(
        "Ask: tenant {} course {:?} ({} chars)",
        request.tenant_id,
        request.course_id,
        request.question.chars().count()
    );

    let answer = state.engine().answer(&request).await?;
    for reason in &answer.degraded {
        tracing::debug!("Degraded: {}", reason);
    }

    tracing::info!(
        "Answered in {}ms (grounded: {}, cached: {})",
        start.elapsed().as_millis(),
        answer.result.grounded,
        answer.cached
    );
    Ok(Json(AskResponse::from_result(answer.result, answer.cached)))
}
