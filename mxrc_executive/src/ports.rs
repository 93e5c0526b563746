//! Collaborator Ports (C12) — §4.12.
//!
//! Grounded on `evo_common::shm::p2p`'s typed, best-effort, heartbeat-
//! carrying cross-process messaging, generalized into two narrow port
//! traits. The CORE only defines and calls these traits; the event bus and
//! the Data Store change dispatcher live outside it, on the Non-RT side.

use crate::state::{RtEvent, RtState};
use std::collections::HashSet;

/// EtherCAT error classification, matching the canonical `ETHERCAT_ERROR`
/// event's `kind` field (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherCatErrorKind {
    /// `master.send()` failed.
    SendFailure,
    /// `master.receive()` failed.
    ReceiveFailure,
    /// Physical link is down.
    LinkDown,
    /// A slave did not respond within the expected window.
    SlaveNotResponding,
    /// The slave configuration's PDO mapping is invalid.
    PdoMappingError,
    /// Distributed Clocks synchronization failed.
    DcSyncError,
    /// The domain buffer is in an inconsistent state.
    DomainError,
    /// The master failed to initialize.
    InitializationError,
}

/// A typed event published by the CORE, fire-and-forget (§4.12).
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// `RT_STATE_CHANGED { from, to, trigger }`.
    RtStateChanged {
        /// Previous state.
        from: RtState,
        /// New state.
        to: RtState,
        /// The event that triggered the transition.
        trigger: RtEvent,
    },
    /// `RT_SAFE_MODE_ENTERED { timeout_ms, reason }`.
    RtSafeModeEntered {
        /// Configured heartbeat timeout, in milliseconds.
        timeout_ms: u64,
        /// Human-readable reason.
        reason: String,
    },
    /// `RT_SAFE_MODE_EXITED { downtime_ms }`.
    RtSafeModeExited {
        /// Time spent in SAFE_MODE, in milliseconds.
        downtime_ms: u64,
    },
    /// `ETHERCAT_ERROR { kind, description, slave_id }`.
    EtherCatError {
        /// Error classification.
        kind: EtherCatErrorKind,
        /// Human-readable description.
        description: String,
        /// Slave position, if the error is slave-specific.
        slave_id: Option<u16>,
    },
}

/// Fire-and-forget typed event publication (§4.12, Event Sink).
///
/// Delivery is best-effort; overflow of whatever queue a collaborator uses
/// is that collaborator's concern, not the CORE's.
pub trait EventSink: Send {
    /// Publish one event. Must not block or allocate on the RT hot path
    /// beyond what the implementation's queue already reserves.
    fn publish(&mut self, event: CoreEvent);
}

/// An [`EventSink`] that discards every event — useful where no
/// collaborator is wired up (tests, standalone benchmarks).
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&mut self, _event: CoreEvent) {}
}

/// Non-RT-side registration: notify interested observers after a Data
/// Store write is quiescent (§4.12, Data Store Observer).
pub trait DataStoreObserver: Send {
    /// Called once per key this observer is registered for, after the
    /// corresponding write has completed (seqlock back to even).
    fn on_key_changed(&mut self, key: usize);
}

/// Which Data Store keys an observer wants to hear about.
#[derive(Debug, Clone, Copy)]
pub enum KeyPattern {
    /// Exactly one key.
    Exact(usize),
    /// An inclusive key range.
    Range(usize, usize),
}

impl KeyPattern {
    fn matches(&self, key: usize) -> bool {
        match *self {
            Self::Exact(k) => k == key,
            Self::Range(lo, hi) => (lo..=hi).contains(&key),
        }
    }
}

/// Non-RT-side registry dispatching key-change notifications to
/// registered [`DataStoreObserver`]s, the primitive §4.12 says the CORE
/// supplies (fan-out to subscribers is the event bus's job, not this
/// registry's).
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<(KeyPattern, Box<dyn DataStoreObserver>)>,
}

impl ObserverRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Register an observer for the given key pattern.
    pub fn register(&mut self, pattern: KeyPattern, observer: Box<dyn DataStoreObserver>) {
        self.observers.push((pattern, observer));
    }

    /// Notify every observer whose pattern matches `key`.
    pub fn notify(&mut self, key: usize) {
        for (pattern, observer) in &mut self.observers {
            if pattern.matches(key) {
                observer.on_key_changed(key);
            }
        }
    }
}

/// Circular-update prevention for the Non-RT adapter (§9): while applying
/// an observed change, the adapter marks the key so a re-entrant write
/// against that same key triggered by a subscriber is suppressed for the
/// duration of the original update.
#[derive(Default)]
pub struct UpdateGuard {
    updating: HashSet<usize>,
}

impl UpdateGuard {
    /// A guard with nothing marked as updating.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as currently being applied from an observed change.
    pub fn begin(&mut self, key: usize) {
        self.updating.insert(key);
    }

    /// Clear `key`'s in-progress mark.
    pub fn end(&mut self, key: usize) {
        self.updating.remove(&key);
    }

    /// Whether `key` is currently marked — a write against it should be
    /// suppressed to break the observer → event-bus → observer cycle.
    #[must_use]
    pub fn is_updating(&self, key: usize) -> bool {
        self.updating.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingObserver {
        count: std::sync::Arc<std::sync::atomic::AtomicU32>,
    }

    impl DataStoreObserver for CountingObserver {
        fn on_key_changed(&mut self, _key: usize) {
            self.count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    }

    #[test]
    fn null_sink_discards_everything() {
        let mut sink = NullEventSink;
        sink.publish(CoreEvent::RtSafeModeExited { downtime_ms: 1 });
    }

    #[test]
    fn observer_notified_only_for_matching_keys() {
        let count = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let mut registry = ObserverRegistry::new();
        registry.register(
            KeyPattern::Range(100, 109),
            Box::new(CountingObserver {
                count: std::sync::Arc::clone(&count),
            }),
        );
        registry.notify(100);
        registry.notify(200);
        registry.notify(109);
        assert_eq!(count.load(std::sync::atomic::Ordering::Relaxed), 2);
    }

    #[test]
    fn update_guard_tracks_in_progress_keys() {
        let mut guard = UpdateGuard::new();
        assert!(!guard.is_updating(5));
        guard.begin(5);
        assert!(guard.is_updating(5));
        guard.end(5);
        assert!(!guard.is_updating(5));
    }
}
