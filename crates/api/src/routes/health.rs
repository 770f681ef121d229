use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Engine launch strategy label.
    pub engine: &'static str,
    /// Free engine slots right now.
    pub engine_slots_available: usize,
}

/// GET /health -- returns service and engine status.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = &state.orchestrator.engine().strategy;
    let status = if engine.verify().is_ok() { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        engine: engine.label(),
        engine_slots_available: state.orchestrator.admission().available(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
