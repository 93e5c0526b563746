//! # mxrc_ethercat
//!
//! The EtherCAT bus side of the RT process: the abstract
//! [`master::EtherCatMaster`] port (C6), the [`pdo`] byte-offset codec
//! (C7), the [`sensor`] read stage (C8), the [`actuator`] write stage
//! (C9), and the [`cycle_driver`] that sequences all four into one
//! `execute(ctx)` call per minor cycle (C10).
//!
//! # Module Structure
//!
//! - [`master`] - the `EtherCatMaster` trait and the in-memory
//!   `SimulationMaster` shim
//! - [`pdo`] - pure, allocation-free fixed-offset decode/encode helpers
//! - [`sensor`] - decodes PDO fields into Data Store entries
//! - [`actuator`] - validates and encodes Data Store commands into PDO
//!   fields
//! - [`cycle_driver`] - `EtherCatCycleDriver`, wrapped as an RT Executive
//!   action via `CycleDriverAction`

#![deny(missing_docs)]

pub mod actuator;
pub mod cycle_driver;
pub mod error;
pub mod master;
pub mod pdo;
pub mod sensor;

pub use cycle_driver::{CycleContext, CycleDriverAction, EtherCatCycleDriver};
pub use error::EtherCatError;
pub use master::{EtherCatMaster, SimulationMaster};
