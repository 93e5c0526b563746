//! # mxrc_executive
//!
//! The RT process's executive: time & scheduling primitives (C1), the RT
//! lifecycle state machine (C4), the heartbeat-driven SAFE_MODE monitor
//! (C5), the cyclic dispatcher that ticks periodic actions (C11), and the
//! narrow collaborator-port traits (C12) the EtherCAT cycle driver and the
//! Non-RT adapter are built against.
//!
//! ## Zero-Allocation RT Loop
//!
//! [`executive::RtExecutive`] pre-allocates its action table at
//! registration time and performs no heap allocation inside
//! [`executive::RtExecutive::tick`]; registered [`executive::Action`]
//! implementations are expected to hold the same discipline.

#![deny(clippy::disallowed_types)]

pub mod error;
pub mod executive;
pub mod heartbeat;
pub mod ports;
pub mod sched;
pub mod state;

pub use error::{ExecutiveError, OsError};
pub use executive::{Action, ExecutiveStats, RtExecutive};
pub use heartbeat::{HeartbeatEvent, HeartbeatMonitor, HEARTBEAT_TIMEOUT_NS};
pub use ports::{CoreEvent, DataStoreObserver, EtherCatErrorKind, EventSink, KeyPattern, NullEventSink, ObserverRegistry, UpdateGuard};
pub use sched::{lock_all_memory, monotonic_now_ns, pin_to_cpu, set_rt_scheduler, sleep_until_ns, SchedPolicy};
pub use state::{RtEvent, RtState, RtStateMachine, TransitionResult};
