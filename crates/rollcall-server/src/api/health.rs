//! Health check API endpoint.

use axum::routing::get;
use axum::{Json, Router};
use rollcall_core::HealthResponse;

use crate::state::SharedState;

/// Creates the health router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/health", get(health_check))
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check agent health",
    description = "Returns basic agent status. Use this endpoint for liveness checks; \
        it does not touch the radio or the attendance service.",
    responses(
        (status = 200, description = "Agent is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
