//! Liveness and queue gauges.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::context::AppContext;

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Deliveries waiting to be received.
    pub queue_depth: usize,
    /// Deliveries received but not yet acknowledged.
    pub in_flight: usize,
    /// Jobs known to the status store.
    pub jobs: usize,
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let status = if ctx.queue.is_closed() { "draining" } else { "ok" };
    Json(HealthResponse {
        status: status.to_string(),
        queue_depth: ctx.queue.depth(),
        in_flight: ctx.queue.in_flight(),
        jobs: ctx.store.len(),
    })
}
