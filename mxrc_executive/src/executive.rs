//! RT Executive (C11) — §4.11.
//!
//! Grounded on `evo_control_unit::cycle::CycleRunner::run`/`run_rt_loop`:
//! the same absolute-deadline `clock_nanosleep` pacing, `rt_setup`
//! sequence, and per-cycle timing-stats/overrun-counting idiom, generalized
//! from "one fixed cycle body" to period-divisibility dispatch over
//! registered actions plus state-driven behavior.

use crate::error::{ExecutiveError, OsError};
use crate::heartbeat::{HeartbeatEvent, HeartbeatMonitor};
use crate::ports::{CoreEvent, EventSink};
use crate::sched::{self, SchedPolicy};
use crate::state::{RtEvent, RtState, RtStateMachine, TransitionResult};
use mxrc_common::consts::MAX_PERIODIC_ACTIONS;
use mxrc_common::data_key::DataKey;
use mxrc_store::{DataStore, SharedMemoryData};
use std::sync::atomic::Ordering;

/// One action the Executive dispatches on a period that is a multiple of
/// the minor cycle.
pub trait Action: Send {
    /// Name used only for diagnostics.
    fn name(&self) -> &str;
    /// Period, in microseconds; must be a multiple of the minor cycle.
    fn period_us(&self) -> u64;
    /// Whether this action still runs while the machine is in SAFE_MODE
    /// (§4.11: "at minimum the Cycle Driver's error-path, no motor
    /// commands"). Defaults to `false`.
    fn safe_mode(&self) -> bool {
        false
    }
    /// Run one invocation. `state`/`sink` let an action perform its own
    /// explicit transitions and event publication (e.g. the EtherCAT
    /// Cycle Driver's error-threshold SAFE_MODE escalation, §4.10); an
    /// `Err` return is reserved for an unexpected failure and is
    /// converted to a generic `ERROR_OCCUR` transition by the Executive
    /// — it never propagates as a panic or exception.
    fn run(
        &mut self,
        store: &DataStore,
        state: &mut RtStateMachine,
        sink: &mut dyn EventSink,
    ) -> Result<(), String>;
}

/// Running statistics for one minor-cycle duration, zero-allocation and
/// updated every tick (mirrors the reference workspace's `CycleStats`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutiveStats {
    tick_count: u64,
    last_ns: u64,
    min_ns: u64,
    max_ns: u64,
    sum_ns: u128,
    sum_sq_ns: u128,
    deadline_misses: u64,
}

impl ExecutiveStats {
    fn record(&mut self, duration_ns: u64) {
        self.tick_count += 1;
        self.last_ns = duration_ns;
        self.min_ns = if self.min_ns == 0 {
            duration_ns
        } else {
            self.min_ns.min(duration_ns)
        };
        self.max_ns = self.max_ns.max(duration_ns);
        self.sum_ns += duration_ns as u128;
        self.sum_sq_ns += (duration_ns as u128) * (duration_ns as u128);
    }

    /// Mean cycle duration in nanoseconds.
    #[must_use]
    pub fn avg_ns(&self) -> u64 {
        if self.tick_count == 0 {
            0
        } else {
            (self.sum_ns / self.tick_count as u128) as u64
        }
    }

    /// Jitter, expressed as the running population variance of cycle
    /// duration in nanoseconds squared.
    #[must_use]
    pub fn jitter_ns2(&self) -> u128 {
        if self.tick_count == 0 {
            return 0;
        }
        let n = self.tick_count as u128;
        let mean = self.sum_ns / n;
        (self.sum_sq_ns / n).saturating_sub(mean * mean)
    }

    /// Total ticks run so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Number of ticks whose body ran past its deadline.
    #[must_use]
    pub const fn deadline_misses(&self) -> u64 {
        self.deadline_misses
    }
}

fn state_code(state: RtState) -> i32 {
    match state {
        RtState::Init => 0,
        RtState::Ready => 1,
        RtState::Running => 2,
        RtState::Paused => 3,
        RtState::SafeMode => 4,
        RtState::Error => 5,
        RtState::Shutdown => 6,
    }
}

/// The cyclic dispatcher (§4.11): one SCHED_FIFO thread pinned to one core,
/// ticking registered [`Action`]s on their configured period.
pub struct RtExecutive {
    minor_cycle_ns: u64,
    major_cycle_ns: u64,
    actions: heapless::Vec<Box<dyn Action>, MAX_PERIODIC_ACTIONS>,
    state: RtStateMachine,
    heartbeat: HeartbeatMonitor,
    stats: ExecutiveStats,
    next_deadline_ns: u64,
    rt_priority: i32,
    cpu_core: usize,
}

impl RtExecutive {
    /// Build an Executive with the given minor cycle (microseconds) and a
    /// major cycle that is `k` minor cycles.
    #[must_use]
    pub fn new(minor_cycle_us: u64, k: u64, rt_priority: i32, cpu_core: usize) -> Self {
        let minor_cycle_ns = minor_cycle_us * 1_000;
        Self {
            minor_cycle_ns,
            major_cycle_ns: minor_cycle_ns * k.max(1),
            actions: heapless::Vec::new(),
            state: RtStateMachine::new(),
            heartbeat: HeartbeatMonitor::new(),
            stats: ExecutiveStats::default(),
            next_deadline_ns: 0,
            rt_priority,
            cpu_core,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RtState {
        self.state.state()
    }

    /// Timing statistics accumulated so far.
    #[must_use]
    pub fn stats(&self) -> ExecutiveStats {
        self.stats
    }

    /// Register a periodic action. Fails if the fixed-capacity table is
    /// already full or the requested period is not a multiple of the
    /// minor cycle.
    pub fn register_action(&mut self, action: Box<dyn Action>) -> Result<(), &'static str> {
        let period_ns = action.period_us() * 1_000;
        if period_ns == 0 || period_ns % self.minor_cycle_ns != 0 {
            return Err("action period must be a positive multiple of the minor cycle");
        }
        self.actions
            .push(action)
            .map_err(|_| "periodic action table is full")
    }

    /// Perform the RT setup sequence (§4.1): lock memory, pin to the
    /// configured core, set SCHED_FIFO priority. No-op outside the `rt`
    /// feature.
    pub fn rt_setup(&self) -> Result<(), OsError> {
        sched::lock_all_memory()?;
        sched::pin_to_cpu(self.cpu_core)?;
        sched::set_rt_scheduler(SchedPolicy::Fifo, self.rt_priority)?;
        Ok(())
    }

    /// `START`/`PAUSE`/`RESUME`/`STOP`/`RESET`, publishing `RT_STATE_CHANGED`
    /// on success.
    pub fn request(&mut self, event: RtEvent, sink: &mut dyn EventSink) -> TransitionResult {
        let from = self.state.state();
        let result = self.state.handle_event(event);
        if let TransitionResult::Ok(to) = result {
            sink.publish(CoreEvent::RtStateChanged {
                from,
                to,
                trigger: event,
            });
        }
        result
    }

    /// Run a single tick: heartbeat check, due-action dispatch, timing,
    /// and pacing. Returns the state at the end of the tick.
    pub fn tick(
        &mut self,
        shared: &SharedMemoryData,
        sink: &mut dyn EventSink,
    ) -> Result<RtState, ExecutiveError> {
        let t_start = sched::monotonic_now_ns()?;
        if self.next_deadline_ns == 0 {
            self.next_deadline_ns = t_start + self.minor_cycle_ns;
        }
        let _ = shared
            .data
            .set_u64(DataKey::RtHeartbeatNs.as_index(), t_start);

        if !matches!(self.state.state(), RtState::Shutdown) {
            let nonrt_hb = shared.nonrt_heartbeat_ns.load(Ordering::Acquire);
            if let Some(event) = self.heartbeat.evaluate(t_start, nonrt_hb, &mut self.state) {
                sink.publish(match event {
                    HeartbeatEvent::Entered { timeout_ms, reason } => {
                        CoreEvent::RtSafeModeEntered { timeout_ms, reason }
                    }
                    HeartbeatEvent::Exited { downtime_ms } => {
                        CoreEvent::RtSafeModeExited { downtime_ms }
                    }
                });
            }
        }

        match self.state.state() {
            RtState::Running => Self::run_due_actions(
                &mut self.actions,
                self.stats.tick_count,
                self.minor_cycle_ns,
                false,
                &shared.data,
                &mut self.state,
                sink,
            ),
            RtState::SafeMode => Self::run_due_actions(
                &mut self.actions,
                self.stats.tick_count,
                self.minor_cycle_ns,
                true,
                &shared.data,
                &mut self.state,
                sink,
            ),
            RtState::Shutdown => {
                let _ = shared
                    .data
                    .set_i32(DataKey::RtStateCode.as_index(), state_code(RtState::Shutdown));
                shared
                    .rt_state_code
                    .store(state_code(RtState::Shutdown) as u32, Ordering::Release);
                return Ok(RtState::Shutdown);
            }
            RtState::Init | RtState::Ready | RtState::Paused | RtState::Error => {}
        }

        let t_end = sched::monotonic_now_ns()?;
        self.stats.record(t_end.saturating_sub(t_start));

        let code = state_code(self.state.state());
        let _ = shared.data.set_i32(DataKey::RtStateCode.as_index(), code);
        shared.rt_state_code.store(code as u32, Ordering::Release);

        if t_end > self.next_deadline_ns {
            self.stats.deadline_misses += 1;
            let _ = shared
                .data
                .set_u64(DataKey::DeadlineMissCount.as_index(), self.stats.deadline_misses);
        } else {
            sched::sleep_until_ns(self.next_deadline_ns)?;
        }
        self.next_deadline_ns += self.minor_cycle_ns;
        Ok(self.state.state())
    }

    /// Run ticks until the state machine reaches `SHUTDOWN`. Intended for
    /// the production RT-process loop; tests drive [`Self::tick`] directly.
    pub fn run(
        &mut self,
        shared: &SharedMemoryData,
        sink: &mut dyn EventSink,
    ) -> Result<(), ExecutiveError> {
        loop {
            if matches!(self.tick(shared, sink)?, RtState::Shutdown) {
                return Ok(());
            }
        }
    }

    fn run_due_actions(
        actions: &mut [Box<dyn Action>],
        tick: u64,
        minor_cycle_ns: u64,
        safe_mode_only: bool,
        store: &DataStore,
        state: &mut RtStateMachine,
        sink: &mut dyn EventSink,
    ) {
        for action in actions {
            if safe_mode_only && !action.safe_mode() {
                continue;
            }
            let period_ticks = (action.period_us() * 1_000) / minor_cycle_ns;
            if period_ticks == 0 || tick % period_ticks != 0 {
                continue;
            }
            if let Err(reason) = action.run(store, state, sink) {
                let from = state.state();
                if let TransitionResult::Ok(to) = state.handle_event(RtEvent::ErrorOccur) {
                    sink.publish(CoreEvent::RtStateChanged {
                        from,
                        to,
                        trigger: RtEvent::ErrorOccur,
                    });
                }
                tracing::error!(action = action.name(), %reason, "periodic action failed");
                break;
            }
        }
    }
}

/// Minor/major cycle period validity (§4.11: "major = k × minor").
#[must_use]
pub fn major_cycle_k(minor_cycle_us: u64, major_cycle_us: u64) -> Option<u64> {
    if minor_cycle_us == 0 || major_cycle_us % minor_cycle_us != 0 {
        return None;
    }
    Some(major_cycle_us / minor_cycle_us)
}
