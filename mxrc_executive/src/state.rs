//! RT State Machine (C4) — §4.4.
//!
//! Same shape as the reference workspace's `MachineStateMachine`: an enum
//! state, an event enum, `handle_event` returning an ok/rejected result, a
//! `const fn new()`, and a total-function transition table expressed as a
//! `match`. The state set and table here are the CORE's, not the
//! reference's axis/recipe lifecycle.

/// The RT process's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtState {
    /// Process has started but shared memory / collaborators are not yet
    /// set up.
    Init,
    /// Initialization complete; the Executive has not yet started ticking.
    Ready,
    /// The Executive is running registered actions every tick.
    Running,
    /// Ticking is suspended; no actions run, deadlines still advance.
    Paused,
    /// Actuators held at safe values; only `safe_mode` actions run.
    SafeMode,
    /// Unrecoverable fault; cyclic execution halted.
    Error,
    /// The RT thread is exiting; shared memory will be unlinked.
    Shutdown,
}

/// Events accepted by [`RtStateMachine::handle_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtEvent {
    /// READY → RUNNING.
    Start,
    /// RUNNING → PAUSED.
    Pause,
    /// PAUSED → RUNNING.
    Resume,
    /// READY/RUNNING/PAUSED/SAFE_MODE → SHUTDOWN.
    Stop,
    /// Any non-terminal state → ERROR.
    ErrorOccur,
    /// READY/RUNNING/PAUSED → SAFE_MODE.
    SafeModeEnter,
    /// SAFE_MODE → RUNNING.
    SafeModeExit,
    /// ERROR → INIT.
    Reset,
}

/// Outcome of [`RtStateMachine::handle_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    /// The event was accepted; the machine is now in the returned state.
    Ok(RtState),
    /// The event is not valid from the machine's current state; state is
    /// unchanged.
    Rejected(&'static str),
}

/// A transition callback: `(from, to, trigger)`, invoked once per accepted
/// transition. The single sink the data model calls for (§4.4) — fan-out to
/// multiple observers happens on the collaborator port (§4.12), not here.
pub type TransitionCallback = dyn FnMut(RtState, RtState, RtEvent) + Send;

/// The RT process's state machine (§4.4).
pub struct RtStateMachine {
    state: RtState,
    on_transition: Option<Box<TransitionCallback>>,
}

impl RtStateMachine {
    /// A fresh machine in `INIT`, with no transition callback registered.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: RtState::Init,
            on_transition: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> RtState {
        self.state
    }

    /// Register the single transition callback sink. Replaces any
    /// previously registered callback.
    pub fn set_transition_callback(&mut self, callback: Box<TransitionCallback>) {
        self.on_transition = Some(callback);
    }

    /// Attempt a transition. Per §4.4's table, `Stop` from `Init` is
    /// rejected (RT has nothing to shut down yet) and `Shutdown` accepts no
    /// events at all.
    pub fn handle_event(&mut self, event: RtEvent) -> TransitionResult {
        let next = match (self.state, event) {
            (RtState::Init, RtEvent::Start) => Some(RtState::Ready),
            (RtState::Init, RtEvent::ErrorOccur) => Some(RtState::Error),

            (RtState::Ready, RtEvent::Start) => Some(RtState::Running),
            (RtState::Ready, RtEvent::Stop) => Some(RtState::Shutdown),
            (RtState::Ready, RtEvent::ErrorOccur) => Some(RtState::Error),
            (RtState::Ready, RtEvent::SafeModeEnter) => Some(RtState::SafeMode),

            (RtState::Running, RtEvent::Pause) => Some(RtState::Paused),
            (RtState::Running, RtEvent::Stop) => Some(RtState::Shutdown),
            (RtState::Running, RtEvent::ErrorOccur) => Some(RtState::Error),
            (RtState::Running, RtEvent::SafeModeEnter) => Some(RtState::SafeMode),

            (RtState::Paused, RtEvent::Resume) => Some(RtState::Running),
            (RtState::Paused, RtEvent::Stop) => Some(RtState::Shutdown),
            (RtState::Paused, RtEvent::ErrorOccur) => Some(RtState::Error),
            (RtState::Paused, RtEvent::SafeModeEnter) => Some(RtState::SafeMode),

            (RtState::SafeMode, RtEvent::Stop) => Some(RtState::Shutdown),
            (RtState::SafeMode, RtEvent::ErrorOccur) => Some(RtState::Error),
            (RtState::SafeMode, RtEvent::SafeModeExit) => Some(RtState::Running),

            (RtState::Error, RtEvent::Stop) => Some(RtState::Shutdown),
            (RtState::Error, RtEvent::Reset) => Some(RtState::Init),

            _ => None,
        };

        match next {
            Some(to) => {
                let from = self.state;
                self.state = to;
                if let Some(cb) = &mut self.on_transition {
                    cb(from, to, event);
                }
                TransitionResult::Ok(to)
            }
            None => TransitionResult::Rejected(invalid_transition_reason(self.state, event)),
        }
    }

    /// Whether the Executive should run ordinary (non-`safe_mode`) actions
    /// in the current state.
    #[must_use]
    pub const fn allows_motion(&self) -> bool {
        matches!(self.state, RtState::Running)
    }
}

impl Default for RtStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_transition_reason(state: RtState, event: RtEvent) -> &'static str {
    match (state, event) {
        (RtState::Shutdown, _) => "SHUTDOWN accepts no further events",
        (_, RtEvent::Reset) => "RESET is only valid from ERROR",
        _ => "event not valid from current state",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_start_reaches_ready() {
        let mut m = RtStateMachine::new();
        assert_eq!(m.handle_event(RtEvent::Start), TransitionResult::Ok(RtState::Ready));
    }

    #[test]
    fn full_happy_path() {
        let mut m = RtStateMachine::new();
        m.handle_event(RtEvent::Start); // INIT -> READY
        m.handle_event(RtEvent::Start); // READY -> RUNNING
        assert_eq!(m.state(), RtState::Running);
        m.handle_event(RtEvent::Pause);
        assert_eq!(m.state(), RtState::Paused);
        m.handle_event(RtEvent::Resume);
        assert_eq!(m.state(), RtState::Running);
        m.handle_event(RtEvent::SafeModeEnter);
        assert_eq!(m.state(), RtState::SafeMode);
        m.handle_event(RtEvent::SafeModeExit);
        assert_eq!(m.state(), RtState::Running);
        m.handle_event(RtEvent::Stop);
        assert_eq!(m.state(), RtState::Shutdown);
    }

    #[test]
    fn error_then_reset_returns_to_init() {
        let mut m = RtStateMachine::new();
        m.handle_event(RtEvent::Start);
        m.handle_event(RtEvent::Start);
        m.handle_event(RtEvent::ErrorOccur);
        assert_eq!(m.state(), RtState::Error);
        assert_eq!(m.handle_event(RtEvent::Reset), TransitionResult::Ok(RtState::Init));
    }

    #[test]
    fn shutdown_rejects_every_event() {
        let mut m = RtStateMachine::new();
        m.handle_event(RtEvent::Start);
        m.handle_event(RtEvent::Stop);
        assert_eq!(m.state(), RtState::Shutdown);
        for event in [
            RtEvent::Start,
            RtEvent::Pause,
            RtEvent::Resume,
            RtEvent::Stop,
            RtEvent::ErrorOccur,
            RtEvent::SafeModeEnter,
            RtEvent::SafeModeExit,
            RtEvent::Reset,
        ] {
            assert!(matches!(m.handle_event(event), TransitionResult::Rejected(_)));
        }
    }

    #[test]
    fn invalid_transition_does_not_change_state() {
        let mut m = RtStateMachine::new();
        assert!(matches!(m.handle_event(RtEvent::Pause), TransitionResult::Rejected(_)));
        assert_eq!(m.state(), RtState::Init);
    }

    #[test]
    fn transition_callback_fires_once_per_accepted_transition() {
        use std::sync::{Arc, Mutex};
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let mut m = RtStateMachine::new();
        m.set_transition_callback(Box::new(move |from, to, ev| {
            log2.lock().unwrap().push((from, to, ev));
        }));
        m.handle_event(RtEvent::Start);
        m.handle_event(RtEvent::Pause); // rejected, no callback
        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(log.lock().unwrap()[0], (RtState::Init, RtState::Ready, RtEvent::Start));
    }

    #[test]
    fn allows_motion_only_in_running() {
        let mut m = RtStateMachine::new();
        assert!(!m.allows_motion());
        m.handle_event(RtEvent::Start);
        m.handle_event(RtEvent::Start);
        assert!(m.allows_motion());
        m.handle_event(RtEvent::Pause);
        assert!(!m.allows_motion());
    }

    #[test]
    fn any_state_error_occur_reaches_error_except_terminal() {
        let mut m = RtStateMachine::new();
        m.handle_event(RtEvent::ErrorOccur);
        assert_eq!(m.state(), RtState::Error);
    }
}
