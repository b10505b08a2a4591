//! BlueZ radio backend built on `bluer`.
//!
//! Discovery runs with `discover_devices_with_changes`, so BlueZ re-emits
//! `DeviceAdded` whenever a cached device's properties (RSSI, manufacturer
//! data) change. A beacon that stays in range keeps producing detections
//! and is reported again once its cooldown has elapsed.

use async_trait::async_trait;
use bluer::{Adapter, AdapterEvent, Address, ErrorKind, Session};
use chrono::Utc;
use futures::{pin_mut, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{DiscoveryEvent, PermissionError, PowerState, Radio, RadioError, RadioEvent, RadioResult};

/// Radio backed by the system's default BlueZ adapter.
///
/// The D-Bus session is opened lazily on first use and kept for the
/// lifetime of the value.
#[derive(Default)]
pub struct BluezRadio {
    adapter: OnceCell<Adapter>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BluezRadio {
    /// Create a radio; no D-Bus traffic happens until first use.
    pub fn new() -> Self {
        Self::default()
    }

    async fn adapter(&self) -> bluer::Result<&Adapter> {
        self.adapter
            .get_or_try_init(|| async {
                let session = Session::new().await?;
                let adapter = session.default_adapter().await?;
                info!("Using Bluetooth adapter {}", adapter.name());
                Ok(adapter)
            })
            .await
    }
}

fn is_permission_error(err: &bluer::Error) -> bool {
    matches!(err.kind, ErrorKind::NotAuthorized | ErrorKind::NotPermitted)
}

#[async_trait]
impl Radio for BluezRadio {
    async fn query_power_state(&self) -> PowerState {
        let adapter = match self.adapter().await {
            Ok(adapter) => adapter,
            Err(e) if is_permission_error(&e) => return PowerState::Unauthorized,
            Err(e) => {
                warn!("Bluetooth adapter unavailable: {}", e);
                return PowerState::Off;
            }
        };

        match adapter.is_powered().await {
            Ok(true) => PowerState::PoweredOn,
            Ok(false) => PowerState::Off,
            Err(e) if is_permission_error(&e) => PowerState::Unauthorized,
            Err(e) => {
                warn!("Failed to read adapter power state: {}", e);
                PowerState::Off
            }
        }
    }

    async fn request_permissions(&self) -> Result<(), PermissionError> {
        // BlueZ has no interactive prompt; access is decided by D-Bus policy,
        // so opening the adapter is the permission check.
        match self.adapter().await {
            Ok(_) => Ok(()),
            Err(e) if is_permission_error(&e) => Err(PermissionError::Denied(e.to_string())),
            Err(e) => {
                debug!("Adapter not available during permission check: {}", e);
                Ok(())
            }
        }
    }

    async fn start_scan(&self, events: mpsc::Sender<RadioEvent>) -> RadioResult<()> {
        if self.task.lock().as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(RadioError::AlreadyScanning);
        }

        let adapter = self
            .adapter()
            .await
            .map_err(|e| RadioError::SessionInitFailed {
                message: e.to_string(),
            })?
            .clone();

        let stream = adapter
            .discover_devices_with_changes()
            .await
            .map_err(|e| RadioError::DiscoveryFailed {
                message: e.to_string(),
            })?;

        let handle = tokio::spawn(async move {
            pin_mut!(stream);
            while let Some(event) = stream.next().await {
                let Some(address) = detected_address(&event) else {
                    continue;
                };
                match describe(&adapter, address).await {
                    Ok(discovery) => {
                        if events.send(RadioEvent::Discovered(discovery)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => debug!("Skipping device {}: {}", address, e),
                }
            }
            let _ = events
                .send(RadioEvent::Error(RadioError::DiscoveryFailed {
                    message: "discovery stream ended unexpectedly".to_string(),
                }))
                .await;
        });

        *self.task.lock() = Some(handle);
        Ok(())
    }

    fn stop_scan(&self) {
        // Dropping the discovery stream inside the task ends discovery.
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

/// The device an adapter event counts as a detection of.
fn detected_address(event: &AdapterEvent) -> Option<Address> {
    match event {
        AdapterEvent::DeviceAdded(address) => Some(*address),
        _ => None,
    }
}

async fn describe(adapter: &Adapter, address: Address) -> bluer::Result<DiscoveryEvent> {
    let device = adapter.device(address)?;
    let device_name = device.name().await?;
    let rssi = device.rssi().await?;
    let manufacturer_data = device.manufacturer_data().await?.unwrap_or_default();

    Ok(DiscoveryEvent {
        device_id: address.to_string(),
        device_name,
        manufacturer_data,
        rssi,
        observed_at: Utc::now(),
    })
}
