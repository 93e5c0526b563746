//! Heartbeat & SAFE_MODE Monitor (C5) — §4.5.
//!
//! The reference workspace's direct ancestor is
//! `evo_control_unit::shm::reader::InboundReader`'s staleness detection
//! (consecutive-miss counting against a threshold); this component
//! generalizes that into a single "now minus last-seen heartbeat" age
//! check against a fixed timeout.

use crate::state::{RtEvent, RtStateMachine, TransitionResult};

/// Consecutive-error timeout, compile-time constant per §4.5/§9's open
/// question, overridable only at build time (never at runtime).
pub const HEARTBEAT_TIMEOUT_NS: u64 = mxrc_common::consts::HEARTBEAT_TIMEOUT_NS;

/// Outcome of a single [`HeartbeatMonitor::evaluate`] call that resulted in
/// a state transition, carrying the payload the collaborator port (§4.12)
/// publishes as `RT_SAFE_MODE_ENTERED`/`RT_SAFE_MODE_EXITED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// SAFE_MODE was entered due to a stale Non-RT heartbeat.
    Entered {
        /// The configured timeout, in milliseconds.
        timeout_ms: u64,
        /// Human-readable reason, suitable for the event payload.
        reason: String,
    },
    /// SAFE_MODE was exited after the heartbeat recovered.
    Exited {
        /// How long the RT process spent in SAFE_MODE, in milliseconds.
        downtime_ms: u64,
    },
}

/// Monitors Non-RT liveness and drives the state machine's
/// SAFE_MODE_ENTER/SAFE_MODE_EXIT transitions.
pub struct HeartbeatMonitor {
    timeout_ns: u64,
    entered_by_heartbeat: bool,
    entered_at_ns: u64,
    /// Internal failure counter (§4.5: "on any failure it records an
    /// internal counter and leaves state unchanged") — incremented when a
    /// SAFE_MODE_ENTER/EXIT event is rejected by the state machine (e.g.
    /// because it is already in ERROR or SHUTDOWN).
    failure_count: u64,
}

impl HeartbeatMonitor {
    /// A monitor using [`HEARTBEAT_TIMEOUT_NS`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_timeout(HEARTBEAT_TIMEOUT_NS)
    }

    /// A monitor with an explicit timeout — primarily for tests.
    #[must_use]
    pub const fn with_timeout(timeout_ns: u64) -> Self {
        Self {
            timeout_ns,
            entered_by_heartbeat: false,
            entered_at_ns: 0,
            failure_count: 0,
        }
    }

    /// Number of times this monitor's requested transition was rejected.
    #[must_use]
    pub const fn failure_count(&self) -> u64 {
        self.failure_count
    }

    /// Evaluate liveness for this tick. Never blocks, never panics.
    pub fn evaluate(
        &mut self,
        now_ns: u64,
        nonrt_heartbeat_ns: u64,
        state_machine: &mut RtStateMachine,
    ) -> Option<HeartbeatEvent> {
        let age_ns = now_ns.saturating_sub(nonrt_heartbeat_ns);
        let stale = age_ns > self.timeout_ns;

        if stale && !self.entered_by_heartbeat {
            match state_machine.handle_event(RtEvent::SafeModeEnter) {
                TransitionResult::Ok(_) => {
                    self.entered_by_heartbeat = true;
                    self.entered_at_ns = now_ns;
                    return Some(HeartbeatEvent::Entered {
                        timeout_ms: self.timeout_ns / 1_000_000,
                        reason: format!(
                            "non-rt heartbeat stale by {}ms",
                            age_ns / 1_000_000
                        ),
                    });
                }
                TransitionResult::Rejected(_) => {
                    self.failure_count += 1;
                }
            }
        } else if !stale && self.entered_by_heartbeat {
            match state_machine.handle_event(RtEvent::SafeModeExit) {
                TransitionResult::Ok(_) => {
                    let downtime_ms = now_ns.saturating_sub(self.entered_at_ns) / 1_000_000;
                    self.entered_by_heartbeat = false;
                    self.entered_at_ns = 0;
                    return Some(HeartbeatEvent::Exited { downtime_ms });
                }
                TransitionResult::Rejected(_) => {
                    self.failure_count += 1;
                }
            }
        }
        None
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RtEvent as E;

    fn running_machine() -> RtStateMachine {
        let mut m = RtStateMachine::new();
        m.handle_event(E::Start);
        m.handle_event(E::Start);
        m
    }

    #[test]
    fn fresh_heartbeat_stays_running() {
        let mut monitor = HeartbeatMonitor::with_timeout(500_000_000);
        let mut m = running_machine();
        let event = monitor.evaluate(1_000_000_000, 1_000_000_000, &mut m);
        assert!(event.is_none());
        assert_eq!(m.state(), crate::state::RtState::Running);
    }

    #[test]
    fn stale_heartbeat_enters_safe_mode_once() {
        let mut monitor = HeartbeatMonitor::with_timeout(500_000_000);
        let mut m = running_machine();
        let now = 2_000_000_000u64;
        let stale_since = now - 600_000_000;
        let event = monitor.evaluate(now, stale_since, &mut m);
        assert!(matches!(event, Some(HeartbeatEvent::Entered { .. })));
        assert_eq!(m.state(), crate::state::RtState::SafeMode);

        // Still stale next tick: no duplicate event.
        let event2 = monitor.evaluate(now + 1_000_000, stale_since, &mut m);
        assert!(event2.is_none());
    }

    #[test]
    fn recovery_exits_safe_mode_with_downtime() {
        let mut monitor = HeartbeatMonitor::with_timeout(500_000_000);
        let mut m = running_machine();
        let enter_at = 2_000_000_000u64;
        monitor.evaluate(enter_at, enter_at - 600_000_000, &mut m);
        assert_eq!(m.state(), crate::state::RtState::SafeMode);

        let recover_at = enter_at + 250_000_000;
        let event = monitor.evaluate(recover_at, recover_at, &mut m);
        match event {
            Some(HeartbeatEvent::Exited { downtime_ms }) => assert_eq!(downtime_ms, 250),
            other => panic!("expected Exited, got {other:?}"),
        }
        assert_eq!(m.state(), crate::state::RtState::Running);
    }

    #[test]
    fn rejected_transition_is_counted_not_panicked() {
        let mut monitor = HeartbeatMonitor::with_timeout(500_000_000);
        let mut m = RtStateMachine::new(); // INIT: SafeModeEnter is rejected
        let now = 2_000_000_000u64;
        let event = monitor.evaluate(now, now - 600_000_000, &mut m);
        assert!(event.is_none());
        assert_eq!(monitor.failure_count(), 1);
        assert_eq!(m.state(), crate::state::RtState::Init);
    }
}
