//! EtherCAT Cycle Driver (C10) — §4.10.
//!
//! Grounded on `evo_control_unit::cycle::CycleRunner::cycle_body`'s
//! three-phase write/exchange/read structure and its `CycleStats`
//! bookkeeping, now driving real `send`/`receive` on an
//! [`EtherCatMaster`] instead of a P2P segment. Registered with the RT
//! Executive as a minor-cycle-period [`mxrc_executive::Action`] whose
//! `safe_mode` path still runs (no motor commands are written while in
//! SAFE_MODE — the outputs/motors phase is skipped, only
//! `send`/`receive`/sensor-read continue, matching §4.11's "at minimum
//! the Cycle Driver's error-path").

use mxrc_executive::{Action, CoreEvent, EtherCatErrorKind, EventSink, RtEvent, RtStateMachine, TransitionResult};
use mxrc_store::DataStore;

use crate::actuator::{write_motor_command, write_output, MotorDescriptor, OutputDescriptor};
use crate::master::EtherCatMaster;
use crate::sensor::{read_sensor_stage, SensorDescriptor};

/// Context passed to [`EtherCatCycleDriver::execute`]. `data_store` is
/// `None` only before the Shared Memory Region has been mapped — the one
/// case the pseudocode's `ctx.data_store is null` check guards against.
pub struct CycleContext<'a> {
    /// The RT process's view of the Data Store, or `None` if not yet
    /// available.
    pub data_store: Option<&'a DataStore>,
}

/// The cyclic write → exchange → read driver (§4.10).
pub struct EtherCatCycleDriver {
    master: Box<dyn EtherCatMaster>,
    outputs: Vec<OutputDescriptor>,
    motors: Vec<MotorDescriptor>,
    sensors: Vec<SensorDescriptor>,
    error_count: u64,
    error_threshold: u64,
    total_cycles: u64,
    motor_command_count: u64,
    read_success_count: u64,
}

impl EtherCatCycleDriver {
    /// A driver wrapping `master`, with §4.10's default error threshold
    /// (`mxrc_common::consts::ERROR_THRESHOLD`).
    #[must_use]
    pub fn new(master: Box<dyn EtherCatMaster>) -> Self {
        Self::with_error_threshold(master, mxrc_common::consts::ERROR_THRESHOLD as u64)
    }

    /// A driver with an explicit error threshold — primarily for tests.
    #[must_use]
    pub fn with_error_threshold(master: Box<dyn EtherCatMaster>, error_threshold: u64) -> Self {
        Self {
            master,
            outputs: Vec::new(),
            motors: Vec::new(),
            sensors: Vec::new(),
            error_count: 0,
            error_threshold,
            total_cycles: 0,
            motor_command_count: 0,
            read_success_count: 0,
        }
    }

    /// Register an output descriptor, written every cycle.
    pub fn register_output(&mut self, output: OutputDescriptor) {
        self.outputs.push(output);
    }

    /// Register a motor descriptor, written every cycle.
    pub fn register_motor(&mut self, motor: MotorDescriptor) {
        self.motors.push(motor);
    }

    /// Register a sensor descriptor, read every cycle.
    pub fn register_sensor(&mut self, sensor: SensorDescriptor) {
        self.sensors.push(sensor);
    }

    /// Total cycles run to completion (reached the sensor-read phase).
    #[must_use]
    pub const fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Consecutive-failure count since the last successful cycle.
    #[must_use]
    pub const fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Successful motor commands encoded, cumulative.
    #[must_use]
    pub const fn motor_command_count(&self) -> u64 {
        self.motor_command_count
    }

    /// Successful sensor decodes, cumulative.
    #[must_use]
    pub const fn read_success_count(&self) -> u64 {
        self.read_success_count
    }

    /// The wrapped master, for diagnostics and injecting PDO data in tests.
    #[must_use]
    pub fn master(&self) -> &dyn EtherCatMaster {
        self.master.as_ref()
    }

    /// The wrapped master, mutably.
    pub fn master_mut(&mut self) -> &mut dyn EtherCatMaster {
        self.master.as_mut()
    }

    /// Run one cycle: write outputs/motors, exchange frames, read sensors
    /// (§4.10's pseudocode). Never panics; every failure path is handled
    /// in place.
    pub fn execute(&mut self, ctx: &CycleContext<'_>, state: &mut RtStateMachine, sink: &mut dyn EventSink) {
        let Some(store) = ctx.data_store else {
            self.fail(EtherCatErrorKind::InitializationError, "data store not mapped", None, state, sink);
            return;
        };

        if state.allows_motion() {
            let domain = self.master.domain_data_mut();
            for output in &self.outputs {
                write_output(output, store, domain);
            }
            for motor in &self.motors {
                if write_motor_command(motor, store, domain) {
                    self.motor_command_count += 1;
                }
            }
        }

        if let Err(e) = self.master.send() {
            self.fail(EtherCatErrorKind::SendFailure, &e.to_string(), None, state, sink);
            return;
        }
        if let Err(e) = self.master.receive() {
            self.fail(EtherCatErrorKind::ReceiveFailure, &e.to_string(), None, state, sink);
            return;
        }

        let domain = self.master.domain_data();
        self.read_success_count += read_sensor_stage(&self.sensors, domain, store, self.master.is_active());

        self.total_cycles += 1;
        self.error_count = 0;
    }

    fn fail(
        &mut self,
        kind: EtherCatErrorKind,
        description: &str,
        slave_id: Option<u16>,
        state: &mut RtStateMachine,
        sink: &mut dyn EventSink,
    ) {
        self.error_count += 1;
        sink.publish(CoreEvent::EtherCatError {
            kind,
            description: description.to_string(),
            slave_id,
        });
        if self.error_count > self.error_threshold {
            let from = state.state();
            if let TransitionResult::Ok(to) = state.handle_event(RtEvent::SafeModeEnter) {
                sink.publish(CoreEvent::RtStateChanged {
                    from,
                    to,
                    trigger: RtEvent::SafeModeEnter,
                });
            }
        }
    }
}

/// Wraps an [`EtherCatCycleDriver`] as a minor-cycle [`Action`] the RT
/// Executive dispatches every tick, with `safe_mode() == true` so the
/// send/receive/sensor-read path keeps running (without motor commands)
/// while SAFE_MODE is active.
pub struct CycleDriverAction {
    driver: EtherCatCycleDriver,
    period_us: u64,
}

impl CycleDriverAction {
    /// Wrap `driver` to run every `period_us` (typically the minor
    /// cycle).
    #[must_use]
    pub fn new(driver: EtherCatCycleDriver, period_us: u64) -> Self {
        Self { driver, period_us }
    }

    /// The wrapped driver, for inspecting counters in tests/diagnostics.
    #[must_use]
    pub fn driver(&self) -> &EtherCatCycleDriver {
        &self.driver
    }
}

impl Action for CycleDriverAction {
    fn name(&self) -> &str {
        "ethercat_cycle_driver"
    }

    fn period_us(&self) -> u64 {
        self.period_us
    }

    fn safe_mode(&self) -> bool {
        true
    }

    fn run(&mut self, store: &DataStore, state: &mut RtStateMachine, sink: &mut dyn EventSink) -> Result<(), String> {
        self.driver.execute(&CycleContext { data_store: Some(store) }, state, sink);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::SimulationMaster;
    use mxrc_executive::NullEventSink;

    fn fresh_store() -> Box<DataStore> {
        let layout = std::alloc::Layout::new::<DataStore>();
        let raw = unsafe { std::alloc::alloc_zeroed(layout) } as *mut DataStore;
        unsafe { Box::from_raw(raw) }
    }

    fn active_master() -> Box<SimulationMaster> {
        let mut m = Box::new(SimulationMaster::new(64));
        m.initialize().unwrap();
        m.activate().unwrap();
        m
    }

    #[test]
    fn null_data_store_emits_initialization_error_and_returns() {
        let mut driver = EtherCatCycleDriver::new(active_master());
        let mut state = RtStateMachine::new();
        let mut sink = NullEventSink;
        driver.execute(&CycleContext { data_store: None }, &mut state, &mut sink);
        assert_eq!(driver.total_cycles(), 0);
        assert_eq!(driver.error_count(), 1);
    }

    #[test]
    fn happy_path_increments_total_cycles_and_resets_errors() {
        let mut driver = EtherCatCycleDriver::new(active_master());
        let store = fresh_store();
        let mut state = RtStateMachine::new();
        state.handle_event(RtEvent::Start);
        state.handle_event(RtEvent::Start);
        let mut sink = NullEventSink;
        driver.execute(&CycleContext { data_store: Some(&store) }, &mut state, &mut sink);
        assert_eq!(driver.total_cycles(), 1);
        assert_eq!(driver.error_count(), 0);
    }

    #[test]
    fn send_failure_increments_error_count_and_skips_receive() {
        let mut master = active_master();
        master.inject_send_failure();
        let mut driver = EtherCatCycleDriver::new(master);
        let store = fresh_store();
        let mut state = RtStateMachine::new();
        state.handle_event(RtEvent::Start);
        state.handle_event(RtEvent::Start);
        let mut sink = NullEventSink;
        driver.execute(&CycleContext { data_store: Some(&store) }, &mut state, &mut sink);
        assert_eq!(driver.total_cycles(), 0);
        assert_eq!(driver.error_count(), 1);
        assert_eq!(state.state(), mxrc_executive::RtState::Running);
    }

    /// A master whose every `send` fails, for driving the driver's
    /// error-threshold escalation deterministically.
    struct AlwaysFailSend(Box<SimulationMaster>);

    impl EtherCatMaster for AlwaysFailSend {
        fn initialize(&mut self) -> Result<(), crate::error::EtherCatError> {
            self.0.initialize()
        }
        fn activate(&mut self) -> Result<(), crate::error::EtherCatError> {
            self.0.activate()
        }
        fn deactivate(&mut self) {
            self.0.deactivate();
        }
        fn send(&mut self) -> Result<(), crate::error::EtherCatError> {
            self.0.inject_send_failure();
            self.0.send()
        }
        fn receive(&mut self) -> Result<(), crate::error::EtherCatError> {
            self.0.receive()
        }
        fn is_active(&self) -> bool {
            self.0.is_active()
        }
        fn error_count(&self) -> u64 {
            self.0.error_count()
        }
        fn domain_data(&self) -> &[u8] {
            self.0.domain_data()
        }
        fn domain_data_mut(&mut self) -> &mut [u8] {
            self.0.domain_data_mut()
        }
    }

    #[test]
    fn errors_beyond_threshold_trigger_safe_mode() {
        let master = Box::new(AlwaysFailSend(active_master()));
        let mut driver = EtherCatCycleDriver::with_error_threshold(master, 2);
        let store = fresh_store();
        let mut state = RtStateMachine::new();
        state.handle_event(RtEvent::Start);
        state.handle_event(RtEvent::Start);
        let mut sink = NullEventSink;
        for _ in 0..4 {
            driver.execute(&CycleContext { data_store: Some(&store) }, &mut state, &mut sink);
        }
        assert_eq!(state.state(), mxrc_executive::RtState::SafeMode);
    }
}
