//! Per-beacon cooldown gate.
//!
//! Keeps a ledger of the last accepted detection per beacon identifier and
//! refuses a second admission inside the cooldown interval. All ledger
//! reads and writes go through one lock, so two near-simultaneous events
//! for the same beacon can never both pass.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Default minimum interval between accepted detections of one beacon.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// When an admission is written to the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownPolicy {
    /// Record at the moment of admission; a failed report still consumes
    /// the window.
    #[default]
    Optimistic,
    /// Record only once the remote report succeeds. While a report is in
    /// flight the beacon is held so concurrent detections cannot double
    /// report.
    OnSuccess,
}

#[derive(Debug, Default)]
struct Ledger {
    last_admitted: HashMap<String, Instant>,
    in_flight: HashSet<String>,
}

/// Cooldown gate over a per-beacon timestamp ledger.
#[derive(Debug)]
pub struct CooldownGate {
    interval: Duration,
    policy: CooldownPolicy,
    ledger: Mutex<Ledger>,
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN, CooldownPolicy::default())
    }
}

impl CooldownGate {
    /// Create a gate with the given interval and recording policy.
    pub fn new(interval: Duration, policy: CooldownPolicy) -> Self {
        Self {
            interval,
            policy,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// The configured cooldown interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// The configured recording policy.
    #[must_use]
    pub const fn policy(&self) -> CooldownPolicy {
        self.policy
    }

    /// True if `beacon_id` has no prior admission or the last one is at
    /// least one interval old.
    pub fn can_admit(&self, beacon_id: &str, now: Instant) -> bool {
        let ledger = self.ledger.lock();
        self.is_clear(&ledger, beacon_id, now)
    }

    /// Unconditionally overwrite the ledger entry for `beacon_id`.
    pub fn record_admission(&self, beacon_id: &str, now: Instant) {
        self.ledger
            .lock()
            .last_admitted
            .insert(beacon_id.to_string(), now);
    }

    /// Check and claim admission for `beacon_id` in one critical section.
    ///
    /// Under [`CooldownPolicy::Optimistic`] a successful claim is recorded
    /// immediately. Under [`CooldownPolicy::OnSuccess`] the beacon is held
    /// in flight until [`CooldownGate::confirm`] or
    /// [`CooldownGate::abandon`].
    pub fn try_admit(&self, beacon_id: &str, now: Instant) -> bool {
        let mut ledger = self.ledger.lock();
        if !self.is_clear(&ledger, beacon_id, now) {
            return false;
        }
        match self.policy {
            CooldownPolicy::Optimistic => {
                ledger.last_admitted.insert(beacon_id.to_string(), now);
            }
            CooldownPolicy::OnSuccess => {
                ledger.in_flight.insert(beacon_id.to_string());
            }
        }
        true
    }

    /// Settle a claim whose report succeeded.
    pub fn confirm(&self, beacon_id: &str, admitted_at: Instant) {
        if self.policy == CooldownPolicy::OnSuccess {
            let mut ledger = self.ledger.lock();
            ledger.in_flight.remove(beacon_id);
            ledger
                .last_admitted
                .insert(beacon_id.to_string(), admitted_at);
        }
    }

    /// Settle a claim whose report did not succeed.
    pub fn abandon(&self, beacon_id: &str) {
        if self.policy == CooldownPolicy::OnSuccess {
            self.ledger.lock().in_flight.remove(beacon_id);
        }
    }

    /// Time of the last recorded admission for `beacon_id`.
    pub fn last_admission(&self, beacon_id: &str) -> Option<Instant> {
        self.ledger.lock().last_admitted.get(beacon_id).copied()
    }

    /// Drop every ledger entry.
    pub fn clear(&self) {
        let mut ledger = self.ledger.lock();
        ledger.last_admitted.clear();
        ledger.in_flight.clear();
    }

    fn is_clear(&self, ledger: &Ledger, beacon_id: &str, now: Instant) -> bool {
        if ledger.in_flight.contains(beacon_id) {
            return false;
        }
        ledger
            .last_admitted
            .get(beacon_id)
            .map_or(true, |last| now.saturating_duration_since(*last) >= self.interval)
    }
}
