//! Manual check-in endpoint.
//!
//! Reports a check-in without waiting for a radio detection. Useful when the
//! beacon is out of range or the radio is unavailable.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rollcall_core::CheckInResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the check-in router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/check-in", post(check_in))
}

/// Manual check-in request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "beacon_identifier": "TEST_BEACON_UUID" }))]
pub struct ManualCheckInRequest {
    /// Beacon to check in at. Defaults to the first configured beacon.
    #[schema(nullable, example = "TEST_BEACON_UUID")]
    #[serde(default)]
    pub beacon_identifier: Option<String>,
}

/// Report a check-in now.
#[utoipa::path(
    post,
    path = "/api/check-in",
    tag = "check-in",
    operation_id = "checkIn",
    summary = "Check in manually",
    description = "Reports a check-in for the given beacon, or the first configured beacon, \
        regardless of scan state and cooldown. Identifiers not in the registry are reported \
        under the label \"Manual Check-in\". Any failure is also recorded as the session's \
        last error.",
    request_body = ManualCheckInRequest,
    responses(
        (status = 200, description = "Checked in", body = CheckInResult),
        (status = 400, description = "No beacon given and none configured", body = ErrorResponse),
        (status = 401, description = "No user signed in", body = ErrorResponse),
        (status = 404, description = "No active attendance session at this beacon", body = ErrorResponse),
        (status = 502, description = "Attendance service failed", body = ErrorResponse)
    )
)]
pub async fn check_in(
    State(state): State<SharedState>,
    Json(request): Json<ManualCheckInRequest>,
) -> ApiResult<Json<CheckInResult>> {
    let beacon_identifier = request
        .beacon_identifier
        .filter(|id| !id.trim().is_empty())
        .or_else(|| {
            state
                .session
                .registry()
                .first()
                .map(|b| b.identifier.clone())
        })
        .ok_or_else(|| ApiError::BadRequest {
            error_code: "no_beacon".to_string(),
            message: "No beacon identifier given and no beacons are configured".to_string(),
        })?;

    let result = state.session.force_check_in(&beacon_identifier).await?;
    Ok(Json(result))
}

#[cfg(all(test, any(feature = "mock-bluetooth", not(feature = "bluetooth"))))]
mod tests {
    use axum::http::StatusCode;
    use rollcall_core::MANUAL_CHECK_IN_LABEL;
    use serde_json::json;

    use super::*;
    use crate::api::scan::StatusResponse;
    use crate::api::test_support::TestAgent;

    #[tokio::test]
    async fn test_defaults_to_first_beacon() {
        let agent = TestAgent::start().await;
        let response = agent.server.post("/api/check-in").json(&json!({})).await;
        response.assert_status_ok();

        let result: CheckInResult = response.json();
        assert_eq!(result.beacon.identifier, "TEST_BEACON_UUID");
        assert_eq!(result.beacon.label, "Choir Room A");
        assert_eq!(result.event_name, "Monday Rehearsal");

        let status: StatusResponse = agent.server.get("/api/status").await.json();
        assert_eq!(
            status.last_check_in.map(|c| c.report_id),
            Some(result.report_id)
        );
    }

    #[tokio::test]
    async fn test_unknown_beacon_gets_manual_label() {
        let agent = TestAgent::start().await;
        let result: CheckInResult = agent
            .server
            .post("/api/check-in")
            .json(&json!({ "beacon_identifier": "PORTABLE_1" }))
            .await
            .json();
        assert_eq!(result.beacon.label, MANUAL_CHECK_IN_LABEL);
    }

    #[tokio::test]
    async fn test_no_active_session() {
        let agent = TestAgent::start().await;
        let response = agent
            .server
            .post("/api/check-in")
            .json(&json!({ "beacon_identifier": "HALL_B" }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let error: ErrorResponse = response.json();
        assert_eq!(error.error, "no_active_session");

        let status: StatusResponse = agent.server.get("/api/status").await.json();
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_service_failure() {
        let agent = TestAgent::start().await;
        let response = agent
            .server
            .post("/api/check-in")
            .json(&json!({ "beacon_identifier": "BROKEN" }))
            .await;
        response.assert_status(StatusCode::BAD_GATEWAY);

        let error: ErrorResponse = response.json();
        assert_eq!(error.details, Some(json!("database down")));
    }

    #[tokio::test]
    async fn test_requires_sign_in() {
        let agent = TestAgent::with_identity(None).await;
        let response = agent.server.post("/api/check-in").json(&json!({})).await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let status: StatusResponse = agent.server.get("/api/status").await.json();
        assert_eq!(status.last_error.as_deref(), Some("No user logged in"));
    }
}
