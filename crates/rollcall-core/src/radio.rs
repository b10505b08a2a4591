//! Radio subsystem abstraction.
//!
//! The scan session talks to the hardware only through the [`Radio`] trait:
//! a power-state query, a permission request, and start/stop of an
//! unfiltered discovery scan that streams [`RadioEvent`]s into a channel.
//!
//! Two backends are provided:
//! - [`BluezRadio`] (feature `bluetooth`) - BlueZ via `bluer`, Linux only
//! - [`MockRadio`] (feature `mock-bluetooth`, or whenever `bluetooth` is off)

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

#[cfg(feature = "bluetooth")]
mod bluez;
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
mod mock;

#[cfg(feature = "bluetooth")]
pub use bluez::BluezRadio;
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub use mock::MockRadio;

/// Power state of the local radio adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    /// Adapter present and powered.
    PoweredOn,
    /// Adapter missing or powered off.
    Off,
    /// The process is not allowed to use the adapter.
    Unauthorized,
}

/// One observation of a nearby advertising device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    /// Platform identifier of the device (a MAC address on BlueZ).
    pub device_id: String,

    /// Advertised local name, if broadcast.
    pub device_name: Option<String>,

    /// Manufacturer-specific advertising data keyed by company id.
    pub manufacturer_data: HashMap<u16, Vec<u8>>,

    /// Signal strength in dBm, if reported.
    pub rssi: Option<i16>,

    /// When the observation was made.
    pub observed_at: DateTime<Utc>,
}

impl DiscoveryEvent {
    /// Create an event for a device observed now.
    pub fn new(device_id: impl Into<String>, device_name: Option<String>) -> Self {
        Self {
            device_id: device_id.into(),
            device_name,
            manufacturer_data: HashMap::new(),
            rssi: None,
            observed_at: Utc::now(),
        }
    }
}

/// Items delivered on the discovery stream while a scan is running.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    /// A device was observed.
    Discovered(DiscoveryEvent),
    /// The scan failed mid-flight; no further events follow.
    Error(RadioError),
}

/// Errors reported by the radio subsystem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RadioError {
    /// No adapter could be found.
    #[error("No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded.")]
    AdapterNotFound,

    /// Opening a session with the radio stack failed.
    #[error("Failed to open radio session: {message}")]
    SessionInitFailed {
        /// Underlying error text.
        message: String,
    },

    /// Discovery could not be started or broke while running.
    #[error("Device discovery failed: {message}")]
    DiscoveryFailed {
        /// Underlying error text.
        message: String,
    },

    /// A scan is already running on this radio.
    #[error("A scan is already in progress")]
    AlreadyScanning,
}

/// Permission acquisition failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PermissionError {
    /// The user or the platform refused access.
    #[error("Permission denied: {0}")]
    Denied(String),
}

/// Result type for radio operations.
pub type RadioResult<T> = std::result::Result<T, RadioError>;

/// The radio subsystem as seen by the scan session.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Current adapter power state.
    async fn query_power_state(&self) -> PowerState;

    /// Acquire whatever permission scanning requires.
    async fn request_permissions(&self) -> Result<(), PermissionError>;

    /// Begin an unfiltered discovery scan.
    ///
    /// Every observation is pushed into `events` until [`Radio::stop_scan`]
    /// is called or a [`RadioEvent::Error`] has been sent.
    async fn start_scan(&self, events: mpsc::Sender<RadioEvent>) -> RadioResult<()>;

    /// Stop scanning. Must be safe to call when no scan is running.
    fn stop_scan(&self);
}
