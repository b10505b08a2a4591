//! OpenAPI specification for the rollcall agent API.
//!
//! The document is served at `/api/openapi.json` and written to disk by the
//! `gen-openapi` binary for client generation.

use axum::Json;
use utoipa::OpenApi;

use super::beacons::BeaconsResponse;
use super::checkin::ManualCheckInRequest;
use super::error::ErrorResponse;
use super::identity::IdentityBody;
use super::scan::StatusResponse;
use rollcall_core::{Beacon, CheckInResult, HealthResponse};

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(build_openapi())
}

/// The full document, including endpoints that only exist on the mock
/// radio.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    #[allow(unused_mut)]
    let mut doc = ApiDoc::openapi();
    #[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
    doc.merge(SimulateApiDoc::openapi());
    doc
}

/// Returns the OpenAPI specification as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    build_openapi().to_pretty_json()
}

/// Main OpenAPI document structure for rollcall.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "rollcall API",
        version = "0.1.0",
        description = r#"
# rollcall API

rollcall checks a participant in to an event automatically when their device comes
within Bluetooth range of a known beacon.

## Overview

The agent owns one scan session and reports check-ins to the attendance service:

1. **Scanning**: start and stop beacon scanning, and read the session status
2. **Check-in**: report a check-in manually when the radio cannot be used
3. **Identity**: sign the user in or out
4. **Beacons**: list the known beacons and matching settings

Each beacon is reported at most once per cooldown window (five minutes by default).
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local rollcall agent")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "scan", description = "Scan session lifecycle and status"),
        (name = "check-in", description = "Manual check-in"),
        (name = "identity", description = "The signed-in user"),
        (name = "beacons", description = "Known beacons")
    ),
    paths(
        super::health::health_check,
        super::scan::get_status,
        super::scan::start_scan,
        super::scan::stop_scan,
        super::checkin::check_in,
        super::identity::get_identity,
        super::identity::set_identity,
        super::beacons::list_beacons,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            StatusResponse,
            ManualCheckInRequest,
            CheckInResult,
            Beacon,
            IdentityBody,
            BeaconsResponse,
        )
    )
)]
pub struct ApiDoc;

#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
#[derive(OpenApi)]
#[openapi(
    tags((name = "radio", description = "Simulated radio")),
    paths(super::simulate::simulate_discovery),
    components(schemas(super::simulate::SimulateRequest, super::simulate::SimulateResponse))
)]
struct SimulateApiDoc;
