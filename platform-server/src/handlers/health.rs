use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::AppState;

/// Health check endpoint.
///
/// Returns "ok" if the service is running. Used by liveness probes.
pub async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    service: String,
}

/// Readiness check endpoint.
///
/// The in-memory backend has no external connection to fail, so readiness
/// degrades to a liveness check plus a config sanity check.
pub async fn readiness(State(state): State<AppState>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        ready: !state.config.serving.primary_domain.is_empty(),
        service: state.config.service.name.clone(),
    })
}
