//! In-process radio for tests and hardware-less environments.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{DiscoveryEvent, PermissionError, PowerState, Radio, RadioError, RadioEvent, RadioResult};

/// A scripted radio. Events are injected with [`MockRadio::emit`].
#[derive(Debug)]
pub struct MockRadio {
    power: Mutex<PowerState>,
    denial: Mutex<Option<String>>,
    start_failure: Mutex<Option<RadioError>>,
    sender: Mutex<Option<mpsc::Sender<RadioEvent>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRadio {
    /// A powered-on radio that grants permission.
    pub fn new() -> Self {
        Self {
            power: Mutex::new(PowerState::PoweredOn),
            denial: Mutex::new(None),
            start_failure: Mutex::new(None),
            sender: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// Change the reported power state.
    pub fn set_power_state(&self, state: PowerState) {
        *self.power.lock() = state;
    }

    /// Refuse permission requests with `reason` (or grant them with `None`).
    pub fn set_permission_denial(&self, reason: Option<String>) {
        *self.denial.lock() = reason;
    }

    /// Make the next `start_scan` call fail with `error`.
    pub fn fail_next_start(&self, error: RadioError) {
        *self.start_failure.lock() = Some(error);
    }

    /// Whether a discovery stream is currently registered.
    pub fn is_scanning(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Number of successful `start_scan` calls.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop_scan` calls that stopped a running scan.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Deliver a discovery event. Returns `false` if no scan is running.
    pub async fn emit(&self, event: DiscoveryEvent) -> bool {
        self.send(RadioEvent::Discovered(event)).await
    }

    /// Deliver a discovery event for a device advertising `name`.
    pub async fn emit_named(&self, name: &str) -> bool {
        let id = format!("mock-{name}");
        self.emit(DiscoveryEvent::new(id, Some(name.to_string())))
            .await
    }

    /// Report a mid-scan failure and end the stream.
    pub async fn fail(&self, error: RadioError) -> bool {
        let delivered = self.send(RadioEvent::Error(error)).await;
        self.sender.lock().take();
        delivered
    }

    /// End the stream without an error, as a radio that quits on its own
    /// would.
    pub fn close_stream(&self) {
        self.sender.lock().take();
    }

    async fn send(&self, event: RadioEvent) -> bool {
        let sender = self.sender.lock().clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl Radio for MockRadio {
    async fn query_power_state(&self) -> PowerState {
        *self.power.lock()
    }

    async fn request_permissions(&self) -> Result<(), PermissionError> {
        match self.denial.lock().clone() {
            Some(reason) => Err(PermissionError::Denied(reason)),
            None => Ok(()),
        }
    }

    async fn start_scan(&self, events: mpsc::Sender<RadioEvent>) -> RadioResult<()> {
        if let Some(err) = self.start_failure.lock().take() {
            return Err(err);
        }
        let mut sender = self.sender.lock();
        if sender.is_some() {
            return Err(RadioError::AlreadyScanning);
        }
        *sender = Some(events);
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop_scan(&self) {
        if self.sender.lock().take().is_some() {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}
