use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the ComfyUI engine answered a system stats probe.
    pub engine_reachable: bool,
}

/// GET /health -- returns service and engine health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine_reachable = state.engine.get_system_stats().await.is_ok();

    let status = if engine_reachable { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        engine_reachable,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
