//! # rollcall-core
//!
//! Core logic for proximity-based automatic attendance.
//!
//! A device carried by a participant listens for Bluetooth advertisements
//! from known beacons. When one is recognised, and it has not been
//! reported within the cooldown window, the participant is checked in with
//! the attendance service and interested observers are told.
//!
//! ## Architecture
//!
//! - [`registry`] - The ordered list of known beacons
//! - [`radio`] - The radio capability and its BlueZ and mock backends
//! - [`matcher`] - Maps a discovery event to at most one beacon
//! - [`cooldown`] - Per-beacon rate limiting of accepted detections
//! - [`checkin`] - Reporting to the remote attendance service
//! - [`fanout`] - Observer notification
//! - [`session`] - The scanning lifecycle tying it together
//! - [`config`] - Layered configuration loading and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod checkin;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod fanout;
pub mod matcher;
pub mod radio;
pub mod registry;
pub mod session;
pub mod types;

#[cfg(feature = "bluetooth")]
pub use radio::BluezRadio;
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub use radio::MockRadio;

pub use checkin::{
    interpret_response, AttendanceService, CheckInAck, CheckInCoordinator, CheckInError,
    CheckInOutcome, CheckInRequest, HttpAttendanceService,
};
pub use config::{
    is_valid_email, ConfigError, ConfigResult, IdentityConfig, LogRotation, LoggingConfig,
    RollcallConfig, ScanConfig, ServerConfig, ServiceConfig,
};
pub use cooldown::{CooldownGate, CooldownPolicy, DEFAULT_COOLDOWN};
pub use error::{Error, Result, RollcallError};
pub use fanout::{EventFanOut, LoggingObserver, Observer, SessionEvent, SubscriptionId};
pub use matcher::{Matcher, DEFAULT_TEST_MARKER};
pub use radio::{
    DiscoveryEvent, PermissionError, PowerState, Radio, RadioError, RadioEvent, RadioResult,
};
pub use registry::BeaconRegistry;
pub use session::{
    FailureReason, ScanSession, ScanSessionState, SessionError, SessionOptions, SessionStatus,
    MANUAL_CHECK_IN_LABEL,
};
pub use types::{Beacon, CheckInResult, HealthResponse, UserIdentity};
