//! Unified error types for the rollcall core library.
//!
//! [`RollcallError`] covers every failure mode an embedding application can
//! see. Modules keep their own narrow error types (`RadioError`,
//! `CheckInError`, `SessionError`, `ConfigError`) and convert into this one
//! at the crate boundary.
//!
//! ```rust
//! use rollcall_core::error::{Result, RollcallError};
//!
//! fn require_email(email: Option<&str>) -> Result<&str> {
//!     email.ok_or(RollcallError::NotSignedIn)
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all rollcall operations.
#[derive(Debug, Error)]
pub enum RollcallError {
    // =========================================================================
    // RADIO ERRORS
    // =========================================================================
    /// The user declined the platform Bluetooth permission request.
    #[error("Bluetooth permission denied: {0}")]
    PermissionDenied(String),

    /// The adapter is not powered on.
    #[error("Bluetooth is turned off. Turn Bluetooth on to scan for attendance beacons.")]
    RadioOff,

    /// No Bluetooth adapter was found on this system.
    #[error(
        "No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded."
    )]
    RadioAdapterNotFound,

    /// Discovery could not be started or broke mid-scan.
    #[error("Bluetooth scan failed: {0}")]
    ScanFailed(String),

    // =========================================================================
    // CHECK-IN ERRORS
    // =========================================================================
    /// The service has no event open at the reported location.
    #[error("No active attendance session for this location")]
    NoActiveSession,

    /// The check-in request failed for any other reason.
    #[error("Check-in failed: {0}")]
    ReportFailed(String),

    /// No user identity is set.
    #[error("No user logged in")]
    NotSignedIn,

    /// The attendance service client could not be built.
    #[error("Attendance service client error: {0}")]
    ServiceClient(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration sources could not be read or deserialized.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // I/O ERRORS
    // =========================================================================
    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for rollcall operations.
pub type Result<T> = std::result::Result<T, RollcallError>;

/// Shorthand for [`RollcallError`].
pub type Error = RollcallError;

impl RollcallError {
    /// Returns `true` if this error came from the radio or its permissions.
    #[inline]
    #[must_use]
    pub const fn is_radio_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::RadioOff
                | Self::RadioAdapterNotFound
                | Self::ScanFailed(_)
        )
    }

    /// Returns `true` if this error came from reporting a check-in.
    #[inline]
    #[must_use]
    pub const fn is_check_in_error(&self) -> bool {
        matches!(
            self,
            Self::NoActiveSession
                | Self::ReportFailed(_)
                | Self::NotSignedIn
                | Self::ServiceClient(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is an ordinary operational condition
    /// rather than a fault. Walking past a beacon with no event open is
    /// normal.
    #[inline]
    #[must_use]
    pub const fn is_expected_state(&self) -> bool {
        matches!(self, Self::NoActiveSession)
    }

    /// Returns `true` if a later retry may succeed without user action.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ReportFailed(_) | Self::ScanFailed(_))
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 401 Unauthorized
            Self::NotSignedIn => 401,

            // 403 Forbidden - the user refused the permission
            Self::PermissionDenied(_) => 403,

            // 404 Not Found
            Self::ConfigNotFound(_) | Self::NoActiveSession => 404,

            // 422 Unprocessable Entity
            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,

            // 500 Internal Server Error
            Self::ServiceClient(_) | Self::IoError(_) => 500,

            // 502 Bad Gateway - the upstream service failed
            Self::ReportFailed(_) => 502,

            // 503 Service Unavailable - radio hardware issues
            Self::RadioOff | Self::RadioAdapterNotFound | Self::ScanFailed(_) => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::RadioOff => "RADIO_OFF",
            Self::RadioAdapterNotFound => "RADIO_ADAPTER_NOT_FOUND",
            Self::ScanFailed(_) => "SCAN_FAILED",
            Self::NoActiveSession => "NO_ACTIVE_SESSION",
            Self::ReportFailed(_) => "REPORT_FAILED",
            Self::NotSignedIn => "NOT_SIGNED_IN",
            Self::ServiceClient(_) => "SERVICE_CLIENT_ERROR",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for RollcallError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path.into()),
            ConfigError::LoadError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::radio::RadioError> for RollcallError {
    fn from(err: crate::radio::RadioError) -> Self {
        use crate::radio::RadioError;
        match err {
            RadioError::AdapterNotFound => Self::RadioAdapterNotFound,
            RadioError::SessionInitFailed { message } | RadioError::DiscoveryFailed { message } => {
                Self::ScanFailed(message)
            }
            RadioError::AlreadyScanning => Self::ScanFailed("scan already running".to_string()),
        }
    }
}

impl From<crate::radio::PermissionError> for RollcallError {
    fn from(err: crate::radio::PermissionError) -> Self {
        match err {
            crate::radio::PermissionError::Denied(reason) => Self::PermissionDenied(reason),
        }
    }
}

impl From<crate::checkin::CheckInError> for RollcallError {
    fn from(err: crate::checkin::CheckInError) -> Self {
        use crate::checkin::CheckInError;
        match err {
            CheckInError::NoActiveSession => Self::NoActiveSession,
            CheckInError::ReportFailed(message) => Self::ReportFailed(message),
            CheckInError::NotSignedIn => Self::NotSignedIn,
        }
    }
}

impl From<crate::session::SessionError> for RollcallError {
    fn from(err: crate::session::SessionError) -> Self {
        use crate::session::SessionError;
        match err {
            SessionError::PermissionDenied(reason) => Self::PermissionDenied(reason),
            SessionError::RadioOff => Self::RadioOff,
            SessionError::Scan(e) => e.into(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
