//! Liveness endpoint.

use axum::Json;
use serde::Serialize;

use crate::dispatch::Task;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tasks: Vec<&'static str>,
}

/// `GET /health` (also `GET /`). The registry is fully loaded before the
/// listener binds, so answering at all means every task is servable.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        tasks: Task::ALL.iter().map(|task| task.name()).collect(),
    })
}
