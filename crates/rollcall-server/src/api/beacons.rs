//! Beacon registry endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use rollcall_core::{Beacon, CooldownPolicy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Creates the beacons router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/beacons", get(list_beacons))
}

/// Known beacons and the matching rules applied to them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "beacons": [{ "identifier": "TEST_BEACON_UUID", "label": "Choir Room A" }],
    "cooldown_secs": 300,
    "cooldown_policy": "optimistic",
    "test_marker": "TEST_BEACON"
}))]
pub struct BeaconsResponse {
    /// Registry entries in match priority order.
    pub beacons: Vec<Beacon>,

    /// Minimum seconds between accepted detections of one beacon.
    #[schema(example = 300)]
    pub cooldown_secs: u64,

    /// When detections are written to the cooldown ledger.
    #[schema(example = "optimistic")]
    pub cooldown_policy: String,

    /// Name token that matches the first registry entry, if enabled.
    #[schema(nullable, example = "TEST_BEACON")]
    pub test_marker: Option<String>,
}

/// List known beacons.
#[utoipa::path(
    get,
    path = "/api/beacons",
    tag = "beacons",
    operation_id = "listBeacons",
    summary = "List known beacons",
    description = "Returns the beacon registry in the order it is matched, plus the \
        cooldown and test-marker settings.",
    responses(
        (status = 200, description = "Beacon registry", body = BeaconsResponse)
    )
)]
pub async fn list_beacons(State(state): State<SharedState>) -> Json<BeaconsResponse> {
    let gate = state.session.cooldown_gate();
    let cooldown_policy = match gate.policy() {
        CooldownPolicy::Optimistic => "optimistic",
        CooldownPolicy::OnSuccess => "on_success",
    };

    Json(BeaconsResponse {
        beacons: state.session.registry().iter().cloned().collect(),
        cooldown_secs: gate.interval().as_secs(),
        cooldown_policy: cooldown_policy.to_string(),
        test_marker: state.session.matcher().test_marker().map(str::to_string),
    })
}

#[cfg(all(test, any(feature = "mock-bluetooth", not(feature = "bluetooth"))))]
mod tests {
    use super::*;
    use crate::api::test_support::TestAgent;

    #[tokio::test]
    async fn test_list_beacons() {
        let agent = TestAgent::start().await;
        let body: BeaconsResponse = agent.server.get("/api/beacons").await.json();

        let ids: Vec<_> = body.beacons.iter().map(|b| b.identifier.as_str()).collect();
        assert_eq!(ids, ["TEST_BEACON_UUID", "HALL_B"]);
        assert_eq!(body.cooldown_secs, 300);
        assert_eq!(body.cooldown_policy, "optimistic");
        assert_eq!(body.test_marker.as_deref(), Some("TEST_BEACON"));
    }
}
