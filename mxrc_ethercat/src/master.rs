//! EtherCAT Master port (C6) — §4.6.
//!
//! `EtherCatMaster` is the abstract capability set the Cycle Driver
//! consumes; the Executive and the driver never touch a vendor SDK
//! directly. [`SimulationMaster`] is the in-memory shim the data model
//! calls for as the test implementation — it is generalized from the
//! reference workspace's `evo_hal::drivers::simulation::SimulationDriver`
//! (an `initialized` flag plus an owned in-process domain buffer standing
//! in for the real one the production driver would DMA into). A
//! production implementation wraps a native EtherCAT stack behind the
//! same trait; none ships here because no such crate appears anywhere in
//! the example corpus this workspace was built from (see `DESIGN.md`).

use crate::error::EtherCatError;

/// Ordering contract (§4.6): within one cycle, [`EtherCatMaster::send`]
/// must precede [`EtherCatMaster::receive`]; callers (the Cycle Driver)
/// guarantee this, not the trait.
pub trait EtherCatMaster: Send {
    /// Bring the master up: scan the bus, map PDOs. Idempotent failure —
    /// may be retried.
    fn initialize(&mut self) -> Result<(), EtherCatError>;
    /// Transition slaves to OPERATIONAL. Requires a prior successful
    /// `initialize`.
    fn activate(&mut self) -> Result<(), EtherCatError>;
    /// Transition slaves back to a safe state. Always succeeds.
    fn deactivate(&mut self);
    /// Queue the current outbound domain buffer for transmission.
    fn send(&mut self) -> Result<(), EtherCatError>;
    /// Collect the inbound domain buffer from the last exchange.
    fn receive(&mut self) -> Result<(), EtherCatError>;
    /// Whether the master is currently OPERATIONAL.
    fn is_active(&self) -> bool;
    /// Consecutive send/receive failure count since the last success.
    fn error_count(&self) -> u64;
    /// The process-image domain buffer, read-only (Sensor Read Stage).
    fn domain_data(&self) -> &[u8];
    /// The process-image domain buffer, mutable (Actuator Write Stage).
    fn domain_data_mut(&mut self) -> &mut [u8];
}

/// In-memory shim implementing [`EtherCatMaster`] with no bus I/O — the
/// test/simulation implementation §4.6 calls for.
pub struct SimulationMaster {
    domain: Vec<u8>,
    initialized: bool,
    active: bool,
    error_count: u64,
    fail_send: bool,
    fail_receive: bool,
}

impl SimulationMaster {
    /// A shim with a zeroed domain buffer of `domain_len` bytes.
    #[must_use]
    pub fn new(domain_len: usize) -> Self {
        Self {
            domain: vec![0u8; domain_len],
            initialized: false,
            active: false,
            error_count: 0,
            fail_send: false,
            fail_receive: false,
        }
    }

    /// Test hook: make the next [`EtherCatMaster::send`] fail.
    pub fn inject_send_failure(&mut self) {
        self.fail_send = true;
    }

    /// Test hook: make the next [`EtherCatMaster::receive`] fail.
    pub fn inject_receive_failure(&mut self) {
        self.fail_receive = true;
    }
}

impl EtherCatMaster for SimulationMaster {
    fn initialize(&mut self) -> Result<(), EtherCatError> {
        self.initialized = true;
        Ok(())
    }

    fn activate(&mut self) -> Result<(), EtherCatError> {
        if !self.initialized {
            return Err(EtherCatError::NotInitialized);
        }
        if self.active {
            return Err(EtherCatError::AlreadyActive);
        }
        self.active = true;
        Ok(())
    }

    fn deactivate(&mut self) {
        self.active = false;
    }

    fn send(&mut self) -> Result<(), EtherCatError> {
        if !self.active {
            return Err(EtherCatError::NotInitialized);
        }
        if self.fail_send {
            self.fail_send = false;
            self.error_count += 1;
            return Err(EtherCatError::SendFailed("simulated send failure".into()));
        }
        self.error_count = 0;
        Ok(())
    }

    fn receive(&mut self) -> Result<(), EtherCatError> {
        if !self.active {
            return Err(EtherCatError::NotInitialized);
        }
        if self.fail_receive {
            self.fail_receive = false;
            self.error_count += 1;
            return Err(EtherCatError::ReceiveFailed(
                "simulated receive failure".into(),
            ));
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn error_count(&self) -> u64 {
        self.error_count
    }

    fn domain_data(&self) -> &[u8] {
        &self.domain
    }

    fn domain_data_mut(&mut self) -> &mut [u8] {
        &mut self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activate_before_initialize_is_rejected() {
        let mut m = SimulationMaster::new(64);
        assert_eq!(m.activate(), Err(EtherCatError::NotInitialized));
    }

    #[test]
    fn happy_path_send_then_receive() {
        let mut m = SimulationMaster::new(64);
        m.initialize().unwrap();
        m.activate().unwrap();
        assert!(m.is_active());
        m.send().unwrap();
        m.receive().unwrap();
        assert_eq!(m.error_count(), 0);
    }

    #[test]
    fn injected_send_failure_increments_error_count() {
        let mut m = SimulationMaster::new(64);
        m.initialize().unwrap();
        m.activate().unwrap();
        m.inject_send_failure();
        assert!(m.send().is_err());
        assert_eq!(m.error_count(), 1);
    }

    #[test]
    fn double_activate_is_rejected() {
        let mut m = SimulationMaster::new(64);
        m.initialize().unwrap();
        m.activate().unwrap();
        assert_eq!(m.activate(), Err(EtherCatError::AlreadyActive));
    }
}
