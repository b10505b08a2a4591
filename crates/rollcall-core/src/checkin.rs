//! Check-in reporting.
//!
//! The [`CheckInCoordinator`] turns an admitted detection into exactly one
//! call to the remote attendance service and interprets the answer. It
//! never retries: a failed report is only retried when the scan loop
//! admits the same beacon again after its cooldown.
//!
//! # Wire contract
//!
//! `POST {base_url}/auto-attendance/check-in` with
//! `{"beacon_identifier": "...", "student_email": "..."}`.
//!
//! - `{"success": true, "event_name": "..."}` is a successful check-in.
//! - An error payload with `"code": "NO_ACTIVE_SESSION"`, or whose `error`
//!   text contains `"No active"`, means the beacon has no open attendance
//!   window. That is expected most of the time and is not a failure.
//! - Anything else is a recoverable [`CheckInError::ReportFailed`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, RollcallError};
use crate::types::{Beacon, CheckInResult, UserIdentity};

/// Path of the check-in endpoint, relative to the service base URL.
pub const CHECK_IN_PATH: &str = "auto-attendance/check-in";

/// Structured code for "no active attendance window".
pub const NO_ACTIVE_SESSION_CODE: &str = "NO_ACTIVE_SESSION";

/// Legacy message fragment for "no active attendance window".
pub const NO_ACTIVE_MARKER: &str = "No active";

/// Default bound on one report round-trip.
pub const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from one check-in report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckInError {
    /// The beacon has no open attendance window right now.
    #[error("No active attendance session for this beacon")]
    NoActiveSession,

    /// Network failure, timeout, server error or malformed response.
    #[error("Check-in failed: {0}")]
    ReportFailed(String),

    /// There is no signed-in user to report for.
    #[error("No user logged in")]
    NotSignedIn,
}

impl CheckInError {
    /// Whether this is the expected "nothing scheduled" outcome.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, Self::NoActiveSession)
    }
}

/// Result type for check-in operations.
pub type CheckInOutcome<T> = std::result::Result<T, CheckInError>;

/// Request body sent to the attendance service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInRequest {
    /// Identifier of the detected beacon.
    pub beacon_identifier: String,
    /// Email of the user checking in.
    pub student_email: String,
}

/// Successful acknowledgement from the attendance service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInAck {
    /// Name of the event the user was checked in to.
    pub event_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    success: bool,
    event_name: Option<String>,
    error: Option<String>,
    message: Option<String>,
    code: Option<String>,
}

impl ResponseBody {
    fn indicates_no_active_session(&self) -> bool {
        self.code.as_deref() == Some(NO_ACTIVE_SESSION_CODE)
            || self
                .error
                .as_deref()
                .is_some_and(|e| e.contains(NO_ACTIVE_MARKER))
    }

    fn error_text(&self) -> Option<&str> {
        self.error.as_deref().or(self.message.as_deref())
    }
}

/// Interpret a raw HTTP status and body from the check-in endpoint.
pub fn interpret_response(status: u16, body: &str) -> CheckInOutcome<CheckInAck> {
    let parsed: Option<ResponseBody> = serde_json::from_str(body).ok();
    let ok_status = (200..300).contains(&status);

    match parsed {
        Some(ResponseBody {
            success: true,
            event_name: Some(event_name),
            ..
        }) if ok_status => Ok(CheckInAck { event_name }),
        Some(body) if body.indicates_no_active_session() => Err(CheckInError::NoActiveSession),
        Some(body) => {
            let message = body.error_text().map_or_else(
                || {
                    if ok_status {
                        "Check-in was not accepted".to_string()
                    } else {
                        format!("HTTP {status}")
                    }
                },
                ToString::to_string,
            );
            Err(CheckInError::ReportFailed(message))
        }
        None if ok_status => Err(CheckInError::ReportFailed(
            "Malformed response from attendance service".to_string(),
        )),
        None => Err(CheckInError::ReportFailed(format!("HTTP {status}"))),
    }
}

/// The remote attendance service.
#[async_trait]
pub trait AttendanceService: Send + Sync {
    /// Submit one check-in.
    async fn check_in(&self, request: &CheckInRequest) -> CheckInOutcome<CheckInAck>;
}

/// [`AttendanceService`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpAttendanceService {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpAttendanceService {
    /// Create a client for the service rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL cannot be formed or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self> {
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join(CHECK_IN_PATH)
            .map_err(|e| RollcallError::ServiceClient(format!("Invalid base URL: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RollcallError::ServiceClient(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    /// The full check-in endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl AttendanceService for HttpAttendanceService {
    async fn check_in(&self, request: &CheckInRequest) -> CheckInOutcome<CheckInAck> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| CheckInError::ReportFailed(format!("Network error: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CheckInError::ReportFailed(format!("Failed to read response: {e}")))?;

        interpret_response(status, &body)
    }
}

/// Reports admitted detections to the attendance service.
#[derive(Clone)]
pub struct CheckInCoordinator {
    service: Arc<dyn AttendanceService>,
    timeout: Duration,
}

impl CheckInCoordinator {
    /// Create a coordinator that bounds each report by `timeout`.
    pub fn new(service: Arc<dyn AttendanceService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Report one check-in. Exactly one attempt is made.
    ///
    /// # Errors
    ///
    /// - [`CheckInError::NoActiveSession`] when the beacon has no open window
    /// - [`CheckInError::ReportFailed`] on any other failure, including timeout
    pub async fn report(
        &self,
        beacon: &Beacon,
        identity: &UserIdentity,
    ) -> CheckInOutcome<CheckInResult> {
        let report_id = Uuid::new_v4();
        let request = CheckInRequest {
            beacon_identifier: beacon.identifier.clone(),
            student_email: identity.email.clone(),
        };

        debug!(%report_id, beacon = %beacon.identifier, "Reporting check-in");

        let outcome = match tokio::time::timeout(self.timeout, self.service.check_in(&request)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(CheckInError::ReportFailed(format!(
                "Check-in timed out after {}ms",
                self.timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(ack) => {
                info!(
                    %report_id,
                    beacon = %beacon.identifier,
                    event = %ack.event_name,
                    "Checked in"
                );
                Ok(CheckInResult {
                    report_id,
                    beacon: beacon.clone(),
                    event_name: ack.event_name,
                    reported_at_utc: Utc::now(),
                })
            }
            Err(CheckInError::NoActiveSession) => {
                info!(%report_id, beacon = %beacon.identifier, "No active attendance session");
                Err(CheckInError::NoActiveSession)
            }
            Err(e) => {
                warn!(%report_id, beacon = %beacon.identifier, error = %e, "Check-in report failed");
                Err(e)
            }
        }
    }
}
