//! Shared types and OpenAPI schemas.
//!
//! This module contains the data model shared across the pipeline and the
//! agent's REST surface. Radio-level types live in [`crate::radio`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A known beacon: a stationary transmitter used as a proximity anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Beacon {
    /// Opaque identifier, unique within the registry.
    #[schema(example = "TEST_BEACON_UUID")]
    pub identifier: String,

    /// Human-readable display name.
    #[schema(example = "Choir Room A")]
    pub label: String,
}

impl Beacon {
    /// Create a beacon from an identifier and label.
    pub fn new(identifier: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            label: label.into(),
        }
    }
}

/// The identity a check-in is reported on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserIdentity {
    /// Email address the attendance service knows the user by.
    #[schema(example = "singer@example.com")]
    pub email: String,
}

impl UserIdentity {
    /// Create an identity from an email address.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

/// Outcome of one successfully reported detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "report_id": "2f1c4c1e-8f3b-4c1e-9a55-0d4b3a2e1f00",
    "beacon": { "identifier": "TEST_BEACON_UUID", "label": "Choir Room A" },
    "event_name": "Monday Rehearsal",
    "reported_at_utc": "2025-01-15T18:30:00Z"
}))]
pub struct CheckInResult {
    /// Client-generated identifier used to correlate logs for this report.
    pub report_id: Uuid,

    /// The beacon the check-in was reported for.
    pub beacon: Beacon,

    /// Event name assigned by the attendance service.
    #[schema(example = "Monday Rehearsal")]
    pub event_name: String,

    /// Client timestamp of the report (UTC).
    pub reported_at_utc: DateTime<Utc>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    #[schema(example = "ok")]
    pub status: String,

    /// Service version.
    #[schema(example = "0.1.0")]
    pub version: String,
}
