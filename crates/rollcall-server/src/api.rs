//! HTTP API routes and handlers.
//!
//! Endpoints are organized by domain:
//! - `health` - Liveness check
//! - `scan` - Session status, start and stop
//! - `checkin` - Manual check-in
//! - `identity` - The signed-in user
//! - `beacons` - The beacon registry
//! - `simulate` - Simulated advertisements (mock radio only)
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod beacons;
pub mod checkin;
pub mod error;
pub mod health;
pub mod identity;
pub mod openapi;
pub mod scan;
#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub mod simulate;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                 - Health check
/// /api
/// ├── /status             - Scan session status
/// ├── /scan/start         - Start scanning
/// ├── /scan/stop          - Stop scanning
/// ├── /check-in           - Manual check-in
/// ├── /identity           - Signed-in user
/// ├── /beacons            - Beacon registry
/// ├── /radio/simulate     - Inject an advertisement (mock radio only)
/// └── /openapi.json       - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    let api = Router::new()
        .merge(scan::router())
        .merge(checkin::router())
        .merge(identity::router())
        .merge(beacons::router())
        .route("/openapi.json", get(openapi::get_openapi_spec));

    #[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
    let api = api.merge(simulate::router());

    Router::new()
        .merge(health::router())
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
