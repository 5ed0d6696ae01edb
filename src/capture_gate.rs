//! Capture gate: body capture is active exactly while an observer is connected
//!
//! The gate holds a single observer count. `is_active()` is derived from it;
//! there is no separate switch that could drift out of sync with the count.
//! Transitions are lock-free so the interceptor hot path can read the gate
//! without touching the hub's mutex.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Observer-count gate
#[derive(Debug, Default)]
pub struct CaptureGate {
    observers: AtomicUsize,
}

impl CaptureGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while at least one observer is connected
    pub fn is_active(&self) -> bool {
        self.observers.load(Ordering::Acquire) > 0
    }

    pub fn observer_count(&self) -> usize {
        self.observers.load(Ordering::Acquire)
    }

    /// Record a joining observer. Returns true on the 0 → 1 transition.
    pub fn observer_joined(&self) -> bool {
        let previous = self.observers.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
            tracing::debug!("capture gate opened");
        }
        previous == 0
    }

    /// Record a leaving observer. Returns true on the 1 → 0 transition.
    ///
    /// Leaving at zero is a no-op; the count never underflows.
    pub fn observer_left(&self) -> bool {
        let result = self
            .observers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match result {
            Ok(1) => {
                tracing::debug!("capture gate closed");
                true
            }
            Ok(_) => false,
            Err(_) => {
                tracing::warn!("observer_left called with no registered observers");
                false
            }
        }
    }
}
