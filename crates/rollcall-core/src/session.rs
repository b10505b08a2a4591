//! Scan session: the radio scanning lifecycle and the detection pipeline.
//!
//! A [`ScanSession`] owns one scanning lifecycle:
//!
//! ```text
//! Idle ──start()──▶ Starting ──scan running──▶ Active ──stop()──▶ Stopping ──▶ Idle
//!                      │                          │
//!                      ├─ permission refused ─────┼──▶ Failed(PermissionDenied)
//!                      ├─ radio powered off ──────┼──▶ Failed(RadioOff)
//!                      └─ scan could not start    └─ mid-scan radio error ──▶ Failed(ScanError)
//! ```
//!
//! While `Active`, every discovery event runs through
//! matcher → cooldown gate → check-in coordinator → fan-out. Matching and
//! the cooldown decision happen inline on the discovery stream; each
//! admitted report is spawned as its own task so a slow network never
//! holds up the next event.
//!
//! `stop()` stops the radio and the discovery pump. Reports already in
//! flight are not cancelled: they finish and still update the last
//! check-in and notify observers. Dropping the session always stops an
//! active scan and clears the cooldown ledger.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::checkin::{CheckInCoordinator, CheckInError, CheckInOutcome, HttpAttendanceService};
use crate::config::RollcallConfig;
use crate::cooldown::{CooldownGate, CooldownPolicy, DEFAULT_COOLDOWN};
use crate::fanout::{EventFanOut, Observer, SessionEvent, SubscriptionId};
use crate::matcher::Matcher;
use crate::radio::{DiscoveryEvent, PowerState, Radio, RadioError, RadioEvent};
use crate::registry::BeaconRegistry;
use crate::types::{Beacon, CheckInResult, UserIdentity};

/// Label used for manual check-ins against identifiers not in the registry.
pub const MANUAL_CHECK_IN_LABEL: &str = "Manual Check-in";

/// Default capacity of the discovery event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Why a session ended up in [`ScanSessionState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureReason {
    /// Scanning permission was refused.
    PermissionDenied(String),
    /// The radio is powered off or missing.
    RadioOff,
    /// The radio failed to start or broke mid-scan.
    ScanError(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied(msg) => write!(f, "permission denied: {msg}"),
            Self::RadioOff => write!(f, "radio is off"),
            Self::ScanError(msg) => write!(f, "scan error: {msg}"),
        }
    }
}

/// Lifecycle state of a scan session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ScanSessionState {
    /// Not scanning.
    #[default]
    Idle,
    /// Acquiring permission and starting the radio.
    Starting,
    /// Scanning; discovery events flow through the pipeline.
    Active,
    /// Tearing down the scan.
    Stopping,
    /// The last start attempt or the running scan failed.
    Failed(FailureReason),
}

impl ScanSessionState {
    /// Short lowercase name of the state.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::Stopping => "stopping",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ScanSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Errors returned by [`ScanSession::start`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Scanning permission was refused.
    #[error("Location permission is required for Bluetooth scanning: {0}")]
    PermissionDenied(String),

    /// The radio is powered off.
    #[error("Bluetooth is not enabled. Please enable Bluetooth to use auto-attendance.")]
    RadioOff,

    /// The radio refused to start or failed mid-scan.
    #[error("Bluetooth scan failed: {0}")]
    Scan(#[from] RadioError),
}

impl SessionError {
    /// The [`FailureReason`] this error puts the session into.
    #[must_use]
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::PermissionDenied(msg) => FailureReason::PermissionDenied(msg.clone()),
            Self::RadioOff => FailureReason::RadioOff,
            Self::Scan(err) => FailureReason::ScanError(err.to_string()),
        }
    }
}

/// Point-in-time view of a session for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Current lifecycle state.
    pub state: ScanSessionState,
    /// Whether the session is actively scanning.
    pub is_scanning: bool,
    /// Most recent successful check-in.
    pub last_check_in: Option<CheckInResult>,
    /// Most recent user-facing error.
    pub last_error: Option<String>,
}

/// Tunables for a scan session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Advertisement matcher.
    pub matcher: Matcher,
    /// Minimum interval between accepted detections of one beacon.
    pub cooldown: Duration,
    /// When admissions are written to the cooldown ledger.
    pub cooldown_policy: CooldownPolicy,
    /// Capacity of the discovery event channel.
    pub event_buffer: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            matcher: Matcher::default(),
            cooldown: DEFAULT_COOLDOWN,
            cooldown_policy: CooldownPolicy::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// An explicitly owned beacon scanning session.
pub struct ScanSession {
    inner: Arc<Inner>,
}

struct Inner {
    radio: Arc<dyn Radio>,
    registry: BeaconRegistry,
    matcher: Matcher,
    gate: CooldownGate,
    coordinator: CheckInCoordinator,
    fanout: EventFanOut,
    event_buffer: usize,

    state: RwLock<ScanSessionState>,
    // Serialises start/stop/mid-scan failure transitions.
    lifecycle: tokio::sync::Mutex<()>,
    pump: Mutex<Option<JoinHandle<()>>>,

    identity: RwLock<Option<UserIdentity>>,
    last_check_in: RwLock<Option<CheckInResult>>,
    last_error: RwLock<Option<String>>,
}

impl ScanSession {
    /// Create an idle session.
    pub fn new(
        radio: Arc<dyn Radio>,
        registry: BeaconRegistry,
        coordinator: CheckInCoordinator,
        options: SessionOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                radio,
                registry,
                matcher: options.matcher,
                gate: CooldownGate::new(options.cooldown, options.cooldown_policy),
                coordinator,
                fanout: EventFanOut::new(),
                event_buffer: options.event_buffer.max(1),
                state: RwLock::new(ScanSessionState::Idle),
                lifecycle: tokio::sync::Mutex::new(()),
                pump: Mutex::new(None),
                identity: RwLock::new(None),
                last_check_in: RwLock::new(None),
                last_error: RwLock::new(None),
            }),
        }
    }

    /// Build a session that reports to the configured HTTP attendance
    /// service, with the configured identity already set.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn from_config(
        radio: Arc<dyn Radio>,
        config: &RollcallConfig,
    ) -> crate::error::Result<Self> {
        let service = HttpAttendanceService::new(&config.base_url()?, config.request_timeout())?;
        debug!(endpoint = %service.endpoint(), "Attendance service configured");

        let coordinator = CheckInCoordinator::new(Arc::new(service), config.request_timeout());
        let session = Self::new(
            radio,
            config.registry(),
            coordinator,
            config.session_options(),
        );
        session.set_identity(config.identity());
        Ok(session)
    }

    /// Start scanning. A no-op if already `Starting` or `Active`.
    ///
    /// # Errors
    ///
    /// Returns the reason the session moved to `Failed`. The session stays
    /// failed until the next call to `start`.
    pub async fn start(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock().await;

        let current = inner.current_state();
        if matches!(current, ScanSessionState::Active | ScanSessionState::Starting) {
            debug!("Already scanning");
            return Ok(());
        }

        inner.set_state(ScanSessionState::Starting);
        *inner.last_error.write() = None;
        let mut guard = StartGuard::new(inner);

        if let Err(e) = inner.radio.request_permissions().await {
            return Err(inner.fail(SessionError::PermissionDenied(e.to_string())));
        }

        match inner.radio.query_power_state().await {
            PowerState::PoweredOn => {}
            PowerState::Off => return Err(inner.fail(SessionError::RadioOff)),
            PowerState::Unauthorized => {
                return Err(inner.fail(SessionError::PermissionDenied(
                    "radio access is not authorized".to_string(),
                )))
            }
        }

        let (tx, rx) = mpsc::channel(inner.event_buffer);
        if let Err(e) = inner.radio.start_scan(tx).await {
            return Err(inner.fail(SessionError::Scan(e)));
        }
        guard.scan_started();

        inner.set_state(ScanSessionState::Active);
        let pump = tokio::spawn(Arc::clone(inner).pump(rx));
        *inner.pump.lock() = Some(pump);
        guard.disarm();

        info!(beacons = inner.registry.len(), "Beacon scanning started");
        Ok(())
    }

    /// Stop scanning. A no-op unless the session is `Active`.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle.lock().await;

        if inner.current_state() != ScanSessionState::Active {
            debug!(state = %inner.current_state(), "Stop requested while not scanning");
            return;
        }

        inner.set_state(ScanSessionState::Stopping);
        inner.radio.stop_scan();
        if let Some(pump) = inner.pump.lock().take() {
            pump.abort();
        }
        inner.set_state(ScanSessionState::Idle);
        info!("Beacon scanning stopped");
    }

    /// Report a check-in for `beacon_identifier` without radio detection.
    ///
    /// Works in any session state and ignores the cooldown gate. Any
    /// failure, including [`CheckInError::NoActiveSession`], is recorded as
    /// the last error.
    ///
    /// # Errors
    ///
    /// Returns [`CheckInError::NotSignedIn`] without an identity, otherwise
    /// whatever the coordinator returned.
    pub async fn force_check_in(&self, beacon_identifier: &str) -> CheckInOutcome<CheckInResult> {
        let inner = &self.inner;
        let Some(identity) = inner.identity.read().clone() else {
            let err = CheckInError::NotSignedIn;
            *inner.last_error.write() = Some(err.to_string());
            return Err(err);
        };

        let beacon = inner
            .registry
            .get(beacon_identifier)
            .cloned()
            .unwrap_or_else(|| Beacon::new(beacon_identifier, MANUAL_CHECK_IN_LABEL));

        info!(beacon = %beacon.identifier, "Manual check-in requested");
        match inner.coordinator.report(&beacon, &identity).await {
            Ok(result) => {
                inner.record_success(result.clone());
                Ok(result)
            }
            Err(e) => {
                *inner.last_error.write() = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Set or clear the identity check-ins are reported for.
    pub fn set_identity(&self, identity: Option<UserIdentity>) {
        *self.inner.identity.write() = identity;
    }

    /// The current identity, if signed in.
    pub fn identity(&self) -> Option<UserIdentity> {
        self.inner.identity.read().clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScanSessionState {
        self.inner.current_state()
    }

    /// Whether the session is actively scanning.
    pub fn is_scanning(&self) -> bool {
        self.state() == ScanSessionState::Active
    }

    /// Most recent successful check-in.
    pub fn last_check_in(&self) -> Option<CheckInResult> {
        self.inner.last_check_in.read().clone()
    }

    /// Most recent user-facing error.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }

    /// Snapshot of everything an observer displays.
    pub fn status(&self) -> SessionStatus {
        let state = self.state();
        SessionStatus {
            is_scanning: state == ScanSessionState::Active,
            state,
            last_check_in: self.last_check_in(),
            last_error: self.last_error(),
        }
    }

    /// The beacon registry this session matches against.
    pub fn registry(&self) -> &BeaconRegistry {
        &self.inner.registry
    }

    /// The advertisement matcher.
    pub fn matcher(&self) -> &Matcher {
        &self.inner.matcher
    }

    /// The cooldown gate guarding this session's reports.
    pub fn cooldown_gate(&self) -> &CooldownGate {
        &self.inner.gate
    }

    /// Subscribe to check-in and failure events.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> SubscriptionId {
        self.inner.fanout.subscribe(observer)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.fanout.unsubscribe(id)
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        let inner = &self.inner;
        if inner.current_state() != ScanSessionState::Idle {
            inner.radio.stop_scan();
        }
        if let Some(pump) = inner.pump.lock().take() {
            pump.abort();
        }
        inner.gate.clear();
        inner.set_state(ScanSessionState::Idle);
    }
}

impl Inner {
    fn current_state(&self) -> ScanSessionState {
        self.state.read().clone()
    }

    fn set_state(&self, state: ScanSessionState) {
        debug!(state = %state, "Scan session state changed");
        *self.state.write() = state;
    }

    fn fail(&self, err: SessionError) -> SessionError {
        let reason = err.failure_reason();
        warn!(reason = %reason, "Scan session failed");
        self.set_state(ScanSessionState::Failed(reason.clone()));
        *self.last_error.write() = Some(err.to_string());
        self.fanout.publish(&SessionEvent::Failed(reason));
        err
    }

    async fn pump(self: Arc<Self>, mut events: mpsc::Receiver<RadioEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                RadioEvent::Discovered(discovery) => self.handle_discovery(&discovery),
                RadioEvent::Error(err) => {
                    self.fail_mid_scan(err).await;
                    return;
                }
            }
        }
        // The radio dropped its sender without reporting why.
        self.fail_mid_scan(RadioError::DiscoveryFailed {
            message: "discovery stream closed".into(),
        })
        .await;
    }

    async fn fail_mid_scan(&self, err: RadioError) {
        let _lifecycle = self.lifecycle.lock().await;
        if self.current_state() != ScanSessionState::Active {
            return;
        }
        self.radio.stop_scan();
        // This task is the pump; detach its own handle instead of aborting.
        drop(self.pump.lock().take());
        self.fail(SessionError::Scan(err));
    }

    fn handle_discovery(self: &Arc<Self>, event: &DiscoveryEvent) {
        if self.current_state() != ScanSessionState::Active {
            return;
        }

        let Some(beacon) = self.matcher.match_event(event, &self.registry) else {
            return;
        };
        debug!(
            beacon = %beacon.identifier,
            device = ?event.device_name,
            "Detected known beacon {}",
            beacon.label
        );

        let Some(identity) = self.identity.read().clone() else {
            debug!(beacon = %beacon.identifier, "No user identity available for check-in");
            return;
        };

        let admitted_at = Instant::now();
        if !self.gate.try_admit(&beacon.identifier, admitted_at) {
            debug!(beacon = %beacon.identifier, "Beacon detected but in cooldown period");
            return;
        }

        info!(beacon = %beacon.identifier, "Beacon admitted for check-in");
        let beacon = beacon.clone();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.report_admitted(beacon, identity, admitted_at).await;
        });
    }

    async fn report_admitted(&self, beacon: Beacon, identity: UserIdentity, admitted_at: Instant) {
        match self.coordinator.report(&beacon, &identity).await {
            Ok(result) => {
                self.gate.confirm(&beacon.identifier, admitted_at);
                self.record_success(result);
            }
            Err(e) if e.is_expected() => {
                debug!(beacon = %beacon.identifier, "No event open at this beacon");
                self.gate.abandon(&beacon.identifier);
            }
            Err(e) => {
                self.gate.abandon(&beacon.identifier);
                *self.last_error.write() = Some(e.to_string());
            }
        }
    }

    fn record_success(&self, result: CheckInResult) {
        *self.last_check_in.write() = Some(result.clone());
        self.fanout.publish(&SessionEvent::CheckedIn(result));
    }
}

/// Undoes a half-finished `start` if it exits early or is cancelled.
struct StartGuard<'a> {
    inner: &'a Inner,
    scan_started: bool,
    armed: bool,
}

impl<'a> StartGuard<'a> {
    const fn new(inner: &'a Inner) -> Self {
        Self {
            inner,
            scan_started: false,
            armed: true,
        }
    }

    fn scan_started(&mut self) {
        self.scan_started = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.scan_started {
            self.inner.radio.stop_scan();
        }
        if self.inner.current_state() == ScanSessionState::Starting {
            self.inner.set_state(ScanSessionState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    use super::*;
    use crate::checkin::tests::FakeService;
    use crate::checkin::{CheckInAck, DEFAULT_REPORT_TIMEOUT};
    use crate::radio::MockRadio;

    const WAIT: Duration = Duration::from_secs(2);

    struct Harness {
        radio: Arc<MockRadio>,
        service: Arc<FakeService>,
        session: ScanSession,
    }

    fn harness_with(service: Arc<FakeService>, options: SessionOptions) -> Harness {
        let radio = Arc::new(MockRadio::new());
        let registry = BeaconRegistry::new(vec![
            Beacon::new("TEST_BEACON_UUID", "Choir Room A"),
            Beacon::new("HALL_B", "Hall B"),
        ]);
        let coordinator = CheckInCoordinator::new(service.clone(), DEFAULT_REPORT_TIMEOUT);
        let session = ScanSession::new(radio.clone(), registry, coordinator, options);
        session.set_identity(Some(UserIdentity::new("singer@example.com")));
        Harness {
            radio,
            service,
            session,
        }
    }

    fn harness(service: Arc<FakeService>) -> Harness {
        harness_with(service, SessionOptions::default())
    }

    fn events(session: &ScanSession) -> UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        session.subscribe(Arc::new(move |e: &SessionEvent| -> anyhow::Result<()> {
            tx.send(e.clone())?;
            Ok(())
        }));
        rx
    }

    async fn next_check_in(rx: &mut UnboundedReceiver<SessionEvent>) -> CheckInResult {
        match timeout(WAIT, rx.recv()).await {
            Ok(Some(SessionEvent::CheckedIn(result))) => result,
            other => panic!("expected a check-in event, got {other:?}"),
        }
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        let poll = async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        assert!(timeout(WAIT, poll).await.is_ok(), "condition not met in time");
    }

    fn assert_send<F: Future + Send>(_: F) {}

    #[test]
    fn test_session_futures_are_send() {
        let h = harness(FakeService::succeeding("x"));
        assert_send(h.session.start());
        assert_send(h.session.stop());
        assert_send(h.session.force_check_in("HALL_B"));
    }

    #[tokio::test]
    async fn test_detection_is_reported_once_per_cooldown() {
        let h = harness(FakeService::succeeding("Monday Rehearsal"));
        let mut rx = events(&h.session);
        h.session.start().await.unwrap();

        assert!(h.radio.emit_named("TEST_BEACON_UUID-7F3").await);
        let result = next_check_in(&mut rx).await;
        assert_eq!(result.event_name, "Monday Rehearsal");
        assert_eq!(result.beacon.label, "Choir Room A");
        assert_eq!(h.session.last_check_in(), Some(result));

        // Same beacon again, then a different one to flush the pump.
        assert!(h.radio.emit_named("TEST_BEACON_UUID-7F3").await);
        assert!(h.radio.emit_named("HALL_B").await);
        let flushed = next_check_in(&mut rx).await;
        assert_eq!(flushed.beacon.identifier, "HALL_B");

        assert_eq!(h.service.calls_for("TEST_BEACON_UUID"), 1);
        assert_eq!(h.service.calls_for("HALL_B"), 1);
    }

    #[tokio::test]
    async fn test_unknown_devices_are_ignored() {
        let h = harness(FakeService::succeeding("x"));
        let mut rx = events(&h.session);
        h.session.start().await.unwrap();

        assert!(h.radio.emit_named("Headphones").await);
        assert!(h.radio.emit_named("HALL_B").await);
        next_check_in(&mut rx).await;
        assert_eq!(h.service.requests.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_no_active_session_is_silent_but_consumes_cooldown() {
        let h = harness(FakeService::with_outcome(Err(CheckInError::NoActiveSession)));
        h.session.start().await.unwrap();

        assert!(h.radio.emit_named("TEST_BEACON_UUID").await);
        wait_until(|| h.service.calls_for("TEST_BEACON_UUID") == 1).await;

        assert_eq!(h.session.last_error(), None);
        assert_eq!(h.session.last_check_in(), None);
        assert!(h
            .session
            .cooldown_gate()
            .last_admission("TEST_BEACON_UUID")
            .is_some());
        assert!(h.session.is_scanning());
    }

    #[tokio::test]
    async fn test_report_failure_sets_last_error_and_keeps_scanning() {
        let h = harness(FakeService::with_outcome(Err(CheckInError::ReportFailed(
            "server error".into(),
        ))));
        h.session.start().await.unwrap();

        assert!(h.radio.emit_named("HALL_B").await);
        wait_until(|| h.session.last_error().is_some()).await;

        assert!(h.session.last_error().unwrap().contains("server error"));
        assert_eq!(h.session.state(), ScanSessionState::Active);
    }

    #[tokio::test]
    async fn test_on_success_policy_retries_after_failure() {
        let service = FakeService::with_outcome(Err(CheckInError::ReportFailed("down".into())));
        let options = SessionOptions {
            cooldown_policy: CooldownPolicy::OnSuccess,
            ..SessionOptions::default()
        };
        let h = harness_with(service, options);
        let mut rx = events(&h.session);
        h.session.start().await.unwrap();

        assert!(h.radio.emit_named("HALL_B").await);
        wait_until(|| h.session.last_error().is_some()).await;

        h.service.set_outcome(Ok(CheckInAck {
            event_name: "Recovered".into(),
        }));
        assert!(h.radio.emit_named("HALL_B").await);
        assert_eq!(next_check_in(&mut rx).await.event_name, "Recovered");
        assert_eq!(h.service.calls_for("HALL_B"), 2);

        // Now recorded: a third sighting is inside the window.
        assert!(h.radio.emit_named("HALL_B").await);
        assert!(h.radio.emit_named("TEST_BEACON_UUID").await);
        next_check_in(&mut rx).await;
        assert_eq!(h.service.calls_for("HALL_B"), 2);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let h = harness(FakeService::succeeding("x"));
        h.session.start().await.unwrap();
        h.session.start().await.unwrap();

        assert_eq!(h.radio.start_count(), 1);
        assert_eq!(h.session.state(), ScanSessionState::Active);
        assert!(h.session.status().is_scanning);
    }

    #[tokio::test]
    async fn test_stop_while_idle_is_noop() {
        let h = harness(FakeService::succeeding("x"));
        h.session.stop().await;
        assert_eq!(h.session.state(), ScanSessionState::Idle);
        assert_eq!(h.radio.stop_count(), 0);
    }

    #[tokio::test]
    async fn test_radio_off_fails_without_scanning() {
        let h = harness(FakeService::succeeding("x"));
        let mut rx = events(&h.session);
        h.radio.set_power_state(PowerState::Off);

        let err = h.session.start().await.unwrap_err();
        assert_eq!(err, SessionError::RadioOff);
        assert_eq!(
            h.session.state(),
            ScanSessionState::Failed(FailureReason::RadioOff)
        );
        assert_eq!(h.radio.start_count(), 0);
        assert!(!h.radio.is_scanning());
        assert!(h.session.last_error().is_some());

        match rx.try_recv() {
            Ok(SessionEvent::Failed(FailureReason::RadioOff)) => {}
            other => panic!("expected failure event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_permission_denied_until_next_start() {
        let h = harness(FakeService::succeeding("x"));
        h.radio
            .set_permission_denial(Some("location refused".into()));

        let err = h.session.start().await.unwrap_err();
        assert!(matches!(err, SessionError::PermissionDenied(_)));
        assert!(matches!(
            h.session.state(),
            ScanSessionState::Failed(FailureReason::PermissionDenied(_))
        ));

        h.radio.set_permission_denial(None);
        h.session.start().await.unwrap();
        assert_eq!(h.session.state(), ScanSessionState::Active);
        assert_eq!(h.session.last_error(), None);
    }

    #[tokio::test]
    async fn test_unauthorized_radio_maps_to_permission_denied() {
        let h = harness(FakeService::succeeding("x"));
        h.radio.set_power_state(PowerState::Unauthorized);
        let err = h.session.start().await.unwrap_err();
        assert!(matches!(err, SessionError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_start_scan_failure() {
        let h = harness(FakeService::succeeding("x"));
        h.radio.fail_next_start(RadioError::AdapterNotFound);

        let err = h.session.start().await.unwrap_err();
        assert_eq!(err, SessionError::Scan(RadioError::AdapterNotFound));
        assert!(matches!(
            h.session.state(),
            ScanSessionState::Failed(FailureReason::ScanError(_))
        ));
    }

    #[tokio::test]
    async fn test_mid_scan_error_stops_and_fails() {
        let h = harness(FakeService::succeeding("x"));
        let mut rx = events(&h.session);
        h.session.start().await.unwrap();

        assert!(
            h.radio
                .fail(RadioError::DiscoveryFailed {
                    message: "adapter vanished".into(),
                })
                .await
        );
        match timeout(WAIT, rx.recv()).await {
            Ok(Some(SessionEvent::Failed(FailureReason::ScanError(msg)))) => {
                assert!(msg.contains("adapter vanished"));
            }
            other => panic!("expected scan failure, got {other:?}"),
        }
        assert!(matches!(h.session.state(), ScanSessionState::Failed(_)));
        assert!(!h.radio.is_scanning());

        // Failed is not Active, so stop has nothing to do.
        h.session.stop().await;
        assert!(matches!(h.session.state(), ScanSessionState::Failed(_)));
    }

    #[tokio::test]
    async fn test_closed_stream_fails_the_session() {
        let h = harness(FakeService::succeeding("x"));
        let mut rx = events(&h.session);
        h.session.start().await.unwrap();

        h.radio.close_stream();
        match timeout(WAIT, rx.recv()).await {
            Ok(Some(SessionEvent::Failed(FailureReason::ScanError(msg)))) => {
                assert!(msg.contains("discovery stream closed"));
            }
            other => panic!("expected scan failure, got {other:?}"),
        }
        assert!(!h.session.is_scanning());
        assert!(h.session.last_error().is_some());

        h.session.start().await.unwrap();
        assert!(h.session.is_scanning());
    }

    #[tokio::test]
    async fn test_stop_does_not_report_a_closed_stream() {
        let h = harness(FakeService::succeeding("x"));
        let mut rx = events(&h.session);
        h.session.start().await.unwrap();
        h.session.stop().await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.session.state(), ScanSessionState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_shuts_the_pipeline() {
        let h = harness(FakeService::succeeding("x"));
        h.session.start().await.unwrap();
        h.session.stop().await;

        assert_eq!(h.session.state(), ScanSessionState::Idle);
        assert_eq!(h.radio.stop_count(), 1);
        assert!(!h.radio.emit_named("HALL_B").await);
        assert!(h.service.requests.lock().is_empty());

        h.session.stop().await;
        assert_eq!(h.radio.stop_count(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_report_survives_stop() {
        let h = harness(FakeService::slow(Duration::from_millis(100)));
        let mut rx = events(&h.session);
        h.session.start().await.unwrap();

        assert!(h.radio.emit_named("HALL_B").await);
        wait_until(|| h.service.calls_for("HALL_B") == 1).await;
        h.session.stop().await;

        let result = next_check_in(&mut rx).await;
        assert_eq!(result.event_name, "late");
        assert_eq!(h.session.last_check_in(), Some(result));
        assert_eq!(h.session.state(), ScanSessionState::Idle);
    }

    #[tokio::test]
    async fn test_detection_without_identity_is_dropped() {
        let h = harness(FakeService::succeeding("x"));
        h.session.set_identity(None);
        h.session.start().await.unwrap();

        assert!(h.radio.emit_named("HALL_B").await);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(h.service.requests.lock().is_empty());
        assert!(h.session.cooldown_gate().last_admission("HALL_B").is_none());
    }

    #[tokio::test]
    async fn test_force_check_in() {
        let h = harness(FakeService::succeeding("Tuesday Sectional"));
        let mut rx = events(&h.session);

        let result = h.session.force_check_in("HALL_B").await.unwrap();
        assert_eq!(result.beacon.label, "Hall B");
        assert_eq!(next_check_in(&mut rx).await, result);
        assert_eq!(h.session.last_check_in(), Some(result));

        let manual = h.session.force_check_in("PORTABLE_7").await.unwrap();
        assert_eq!(manual.beacon.label, MANUAL_CHECK_IN_LABEL);

        // Manual check-ins bypass the cooldown gate.
        h.session.force_check_in("HALL_B").await.unwrap();
        assert_eq!(h.service.calls_for("HALL_B"), 2);
        assert!(h.session.cooldown_gate().last_admission("HALL_B").is_none());
    }

    #[tokio::test]
    async fn test_force_check_in_errors_are_surfaced() {
        let h = harness(FakeService::with_outcome(Err(CheckInError::NoActiveSession)));
        let err = h.session.force_check_in("HALL_B").await.unwrap_err();
        assert_eq!(err, CheckInError::NoActiveSession);
        assert!(h.session.last_error().is_some());

        h.session.set_identity(None);
        let err = h.session.force_check_in("HALL_B").await.unwrap_err();
        assert_eq!(err, CheckInError::NotSignedIn);
        assert_eq!(h.session.last_error().as_deref(), Some("No user logged in"));
    }

    #[tokio::test]
    async fn test_drop_stops_scanning() {
        let h = harness(FakeService::succeeding("x"));
        h.session.start().await.unwrap();
        let radio = Arc::clone(&h.radio);
        drop(h);
        assert!(!radio.is_scanning());
        assert_eq!(radio.stop_count(), 1);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ScanSessionState::Active.to_string(), "active");
        assert_eq!(
            ScanSessionState::Failed(FailureReason::RadioOff).to_string(),
            "failed (radio is off)"
        );
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ScanSessionState::Failed(
            FailureReason::PermissionDenied("nope".into()),
        ))
        .unwrap();
        assert!(json.contains("\"state\":\"failed\""));
        assert!(json.contains("permission_denied"));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = RollcallConfig::from_toml_str(
            r#"
[service]
base_url = "http://127.0.0.1:9"

[identity]
email = "alto@example.com"

[[beacons]]
identifier = "HALL_A"
label = "Hall A"
"#,
        )
        .unwrap();

        let session = ScanSession::from_config(Arc::new(MockRadio::new()), &config).unwrap();
        assert_eq!(session.identity(), Some(UserIdentity::new("alto@example.com")));
        assert_eq!(session.registry().len(), 1);
        assert_eq!(session.cooldown_gate().interval(), DEFAULT_COOLDOWN);
        assert_eq!(session.state(), ScanSessionState::Idle);
    }
}
