//! Identity API endpoints.
//!
//! The surrounding application signs the user in and out by setting the
//! email the agent reports check-ins for.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rollcall_core::{is_valid_email, UserIdentity};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the identity router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/identity", get(get_identity).put(set_identity))
}

/// The signed-in user, or `null` when signed out.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "email": "singer@example.com" }))]
pub struct IdentityBody {
    /// Email address check-ins are reported for.
    #[schema(nullable, example = "singer@example.com")]
    pub email: Option<String>,
}

/// Get the signed-in user.
#[utoipa::path(
    get,
    path = "/api/identity",
    tag = "identity",
    operation_id = "getIdentity",
    summary = "Get the signed-in user",
    responses(
        (status = 200, description = "Current identity", body = IdentityBody)
    )
)]
pub async fn get_identity(State(state): State<SharedState>) -> Json<IdentityBody> {
    Json(IdentityBody {
        email: state.session.identity().map(|i| i.email),
    })
}

/// Sign a user in, or out with `{"email": null}`.
#[utoipa::path(
    put,
    path = "/api/identity",
    tag = "identity",
    operation_id = "setIdentity",
    summary = "Set the signed-in user",
    description = "Sets the email check-ins are reported for. Detections while signed out \
        are ignored and do not consume the cooldown.",
    request_body = IdentityBody,
    responses(
        (status = 200, description = "Identity updated", body = IdentityBody),
        (status = 400, description = "Invalid email address", body = ErrorResponse)
    )
)]
pub async fn set_identity(
    State(state): State<SharedState>,
    Json(body): Json<IdentityBody>,
) -> ApiResult<Json<IdentityBody>> {
    let email = body.email.map(|e| e.trim().to_string());
    if let Some(email) = &email {
        if !is_valid_email(email) {
            return Err(ApiError::BadRequest {
                error_code: "invalid_email".to_string(),
                message: format!("'{email}' is not a valid email address"),
            });
        }
    }

    info!(signed_in = email.is_some(), "Identity updated");
    state.session.set_identity(email.clone().map(UserIdentity::new));
    Ok(Json(IdentityBody { email }))
}

#[cfg(all(test, any(feature = "mock-bluetooth", not(feature = "bluetooth"))))]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::api::test_support::TestAgent;

    #[tokio::test]
    async fn test_sign_out_and_in() {
        let agent = TestAgent::start().await;

        let body: IdentityBody = agent
            .server
            .put("/api/identity")
            .json(&json!({ "email": null }))
            .await
            .json();
        assert!(body.email.is_none());
        assert!(agent.state.session.identity().is_none());

        let body: IdentityBody = agent
            .server
            .put("/api/identity")
            .json(&json!({ "email": " tenor@example.com " }))
            .await
            .json();
        assert_eq!(body.email.as_deref(), Some("tenor@example.com"));

        let body: IdentityBody = agent.server.get("/api/identity").await.json();
        assert_eq!(body.email.as_deref(), Some("tenor@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_email_is_rejected() {
        let agent = TestAgent::start().await;
        let response = agent
            .server
            .put("/api/identity")
            .json(&json!({ "email": "nobody" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            agent.state.session.identity(),
            Some(UserIdentity::new("singer@example.com"))
        );
    }
}
