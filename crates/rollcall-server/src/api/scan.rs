//! Scan session API endpoints.
//!
//! The agent owns one scan session. These endpoints report its status and
//! start or stop scanning.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rollcall_core::{CheckInResult, ScanSessionState};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::{AppState, SharedState};

/// Creates the scan router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/scan/start", post(start_scan))
        .route("/scan/stop", post(stop_scan))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Snapshot of the scan session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "state": "active",
    "failure_reason": null,
    "is_scanning": true,
    "last_check_in": null,
    "last_error": null,
    "signed_in_as": "singer@example.com",
    "radio_backend": "bluez",
    "checked_at_utc": "2025-01-15T18:30:00Z"
}))]
pub struct StatusResponse {
    /// Lifecycle state: idle, starting, active, stopping or failed.
    #[schema(example = "active")]
    pub state: String,

    /// Why the session failed, when `state` is `failed`.
    #[schema(nullable)]
    pub failure_reason: Option<String>,

    /// Whether the session is actively scanning.
    #[schema(example = true)]
    pub is_scanning: bool,

    /// Most recent successful check-in.
    #[schema(nullable)]
    pub last_check_in: Option<CheckInResult>,

    /// Most recent user-facing error.
    #[schema(nullable)]
    pub last_error: Option<String>,

    /// Email the agent checks in for, if signed in.
    #[schema(nullable, example = "singer@example.com")]
    pub signed_in_as: Option<String>,

    /// Radio backend in use.
    #[schema(example = "bluez")]
    pub radio_backend: String,

    /// When this snapshot was taken.
    #[schema(example = "2025-01-15T18:30:00Z")]
    pub checked_at_utc: String,
}

impl StatusResponse {
    /// Snapshot the session held by `state`.
    pub fn capture(state: &AppState) -> Self {
        let status = state.session.status();
        let failure_reason = match &status.state {
            ScanSessionState::Failed(reason) => Some(reason.to_string()),
            _ => None,
        };

        Self {
            state: status.state.name().to_string(),
            failure_reason,
            is_scanning: status.is_scanning,
            last_check_in: status.last_check_in,
            last_error: status.last_error,
            signed_in_as: state.session.identity().map(|i| i.email),
            radio_backend: state.radio_backend.to_string(),
            checked_at_utc: Utc::now().to_rfc3339(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Get the scan session status.
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "scan",
    operation_id = "getStatus",
    summary = "Get scan session status",
    description = "Returns the session state, whether it is scanning, the most recent \
        check-in and the most recent error.",
    responses(
        (status = 200, description = "Current status", body = StatusResponse)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse::capture(&state))
}

/// Start scanning.
#[utoipa::path(
    post,
    path = "/api/scan/start",
    tag = "scan",
    operation_id = "startScan",
    summary = "Start beacon scanning",
    description = "Requests radio permission, checks that the radio is on and starts \
        discovery. Calling it while already scanning does nothing. On failure the \
        session stays failed until the next start.",
    responses(
        (status = 200, description = "Scanning", body = StatusResponse),
        (status = 403, description = "Radio permission refused", body = ErrorResponse),
        (status = 503, description = "Radio off or scan failed", body = ErrorResponse)
    )
)]
pub async fn start_scan(State(state): State<SharedState>) -> ApiResult<Json<StatusResponse>> {
    state.session.start().await?;
    Ok(Json(StatusResponse::capture(&state)))
}

/// Stop scanning.
#[utoipa::path(
    post,
    path = "/api/scan/stop",
    tag = "scan",
    operation_id = "stopScan",
    summary = "Stop beacon scanning",
    description = "Stops discovery. Check-ins already being reported still complete. \
        Does nothing unless the session is scanning.",
    responses(
        (status = 200, description = "Stopped", body = StatusResponse)
    )
)]
pub async fn stop_scan(State(state): State<SharedState>) -> Json<StatusResponse> {
    state.session.stop().await;
    Json(StatusResponse::capture(&state))
}

#[cfg(all(test, any(feature = "mock-bluetooth", not(feature = "bluetooth"))))]
mod tests {
    use axum::http::StatusCode;
    use rollcall_core::PowerState;

    use super::*;
    use crate::api::test_support::TestAgent;

    #[tokio::test]
    async fn test_status_starts_idle() {
        let agent = TestAgent::start().await;
        let response = agent.server.get("/api/status").await;
        response.assert_status_ok();

        let body: StatusResponse = response.json();
        assert_eq!(body.state, "idle");
        assert!(!body.is_scanning);
        assert_eq!(body.radio_backend, "mock");
        assert_eq!(body.signed_in_as.as_deref(), Some("singer@example.com"));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let agent = TestAgent::start().await;

        let body: StatusResponse = agent.server.post("/api/scan/start").await.json();
        assert_eq!(body.state, "active");
        assert!(body.is_scanning);
        assert!(agent.radio.is_scanning());

        // Idempotent.
        agent.server.post("/api/scan/start").await.assert_status_ok();
        assert_eq!(agent.radio.start_count(), 1);

        let body: StatusResponse = agent.server.post("/api/scan/stop").await.json();
        assert_eq!(body.state, "idle");
        assert!(!agent.radio.is_scanning());
    }

    #[tokio::test]
    async fn test_start_with_radio_off() {
        let agent = TestAgent::start().await;
        agent.radio.set_power_state(PowerState::Off);

        let response = agent.server.post("/api/scan/start").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let error: ErrorResponse = response.json();
        assert_eq!(error.error, "radio_off");

        let body: StatusResponse = agent.server.get("/api/status").await.json();
        assert_eq!(body.state, "failed");
        assert_eq!(body.failure_reason.as_deref(), Some("radio is off"));
        assert!(body.last_error.is_some());
    }

    #[tokio::test]
    async fn test_start_with_permission_denied() {
        let agent = TestAgent::start().await;
        agent
            .radio
            .set_permission_denial(Some("user declined".to_string()));

        let response = agent.server.post("/api/scan/start").await;
        response.assert_status(StatusCode::FORBIDDEN);

        agent.radio.set_permission_denial(None);
        let body: StatusResponse = agent.server.post("/api/scan/start").await.json();
        assert_eq!(body.state, "active");
        assert!(body.last_error.is_none());
    }
}
