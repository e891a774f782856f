use axum::{extract::Extension, Json};
use serde::Serialize;

use crate::kernel::jobs::OrchestratorStats;
use crate::server::app::AxumAppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    stats: OrchestratorStats,
}

/// Health check endpoint
///
/// Reports job counts by status, admission queue occupancy and cache size.
/// Always 200: the proxy has no backing store whose outage would make it
/// unhealthy.
pub async fn health_handler(Extension(state): Extension<AxumAppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        stats: state.orchestrator.stats(),
    })
}
