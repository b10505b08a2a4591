//! Simulated radio endpoint, available when the agent runs on the mock
//! radio.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use rollcall_core::DiscoveryEvent;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::state::SharedState;

/// Creates the simulation router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/radio/simulate", post(simulate_discovery))
}

/// A fake advertisement to inject.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "device_id": "AA:BB:CC:DD:EE:FF",
    "device_name": "TEST_BEACON_UUID",
    "rssi": -58
}))]
pub struct SimulateRequest {
    /// Platform identifier of the advertising device.
    #[schema(example = "AA:BB:CC:DD:EE:FF")]
    pub device_id: String,

    /// Advertised local name.
    #[schema(nullable, example = "TEST_BEACON_UUID")]
    #[serde(default)]
    pub device_name: Option<String>,

    /// Signal strength in dBm.
    #[schema(nullable, example = -58)]
    #[serde(default)]
    pub rssi: Option<i16>,
}

/// Whether the advertisement reached a running scan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SimulateResponse {
    /// `false` if the session was not scanning.
    #[schema(example = true)]
    pub delivered: bool,
}

/// Inject a discovery event into the mock radio.
#[utoipa::path(
    post,
    path = "/api/radio/simulate",
    tag = "radio",
    operation_id = "simulateDiscovery",
    summary = "Inject a simulated advertisement",
    description = "Feeds one discovery event through the running scan as if the radio had \
        heard it. The event is matched, rate limited and reported like a real detection.",
    request_body = SimulateRequest,
    responses(
        (status = 200, description = "Event injected", body = SimulateResponse)
    )
)]
pub async fn simulate_discovery(
    State(state): State<SharedState>,
    Json(request): Json<SimulateRequest>,
) -> Json<SimulateResponse> {
    let mut event = DiscoveryEvent::new(request.device_id, request.device_name);
    event.rssi = request.rssi;

    let delivered = state.mock_radio.emit(event).await;
    debug!(delivered, "Simulated advertisement");
    Json(SimulateResponse { delivered })
}
