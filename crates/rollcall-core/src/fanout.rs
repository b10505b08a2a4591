//! Event fan-out to observers.
//!
//! Observers receive every successful check-in and every terminal session
//! failure, in subscription order. Delivery is best-effort: an observer
//! that returns an error or panics is logged and skipped, the rest still
//! get the event.
//! There is no replay for late subscribers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::session::FailureReason;
use crate::types::CheckInResult;

/// Events published by a scan session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A check-in was reported successfully.
    CheckedIn(CheckInResult),
    /// The session entered a terminal `Failed` state.
    Failed(FailureReason),
}

/// Something interested in session events.
pub trait Observer: Send + Sync {
    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Errors are logged by the fan-out and do not affect other observers.
    fn notify(&self, event: &SessionEvent) -> anyhow::Result<()>;
}

impl<F> Observer for F
where
    F: Fn(&SessionEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn notify(&self, event: &SessionEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Handle returned by [`EventFanOut::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered observer list.
#[derive(Default)]
pub struct EventFanOut {
    next_id: AtomicU64,
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn Observer>)>>,
}

impl EventFanOut {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer at the end of the delivery order.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, observer));
        id
    }

    /// Remove an observer. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    /// Number of current observers.
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Whether there are no observers.
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Deliver `event` to every current observer.
    ///
    /// Observers are called on a snapshot of the list, so they may
    /// subscribe or unsubscribe from inside `notify`.
    pub fn publish(&self, event: &SessionEvent) {
        let snapshot: Vec<_> = self.observers.read().clone();
        for (id, observer) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| observer.notify(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(subscription = id.0, error = %e, "Observer failed to handle event");
                }
                Err(payload) => {
                    error!(
                        subscription = id.0,
                        panic = panic_message(payload.as_ref()),
                        "Observer panicked while handling event"
                    );
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Observer that writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn notify(&self, event: &SessionEvent) -> anyhow::Result<()> {
        match event {
            SessionEvent::CheckedIn(result) => info!(
                report_id = %result.report_id,
                beacon = %result.beacon.label,
                event = %result.event_name,
                "Checked in to {}",
                result.event_name
            ),
            SessionEvent::Failed(reason) => warn!(reason = %reason, "Scan session failed"),
        }
        Ok(())
    }
}
