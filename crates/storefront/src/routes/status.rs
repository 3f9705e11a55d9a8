//! Connectivity status and health checks.

use autosalon_sync::LoadState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub online: bool,
    pub load_state: LoadState,
    pub cars: usize,
}

/// What the offline banner polls.
///
/// GET /api/status
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let context = state.context();
    Json(StatusResponse {
        online: state.monitor().is_online(),
        load_state: context.load_state().await,
        cars: context.cars().await.len(),
    })
}

/// Liveness check.
///
/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness check: the hosted backend must answer.
///
/// GET /health/ready
pub async fn ready(State(state): State<AppState>) -> StatusCode {
    match state.context().remote().health().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
