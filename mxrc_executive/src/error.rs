//! Error types shared by the Time & Scheduling Primitives (C1), RT
//! Executive (C11), and Heartbeat Monitor (C5).

use thiserror::Error;

/// A failed OS-level scheduling, memory, or clock syscall (§4.1).
///
/// Every C1 operation returns this on syscall failure; none panic.
#[derive(Debug, Error)]
pub enum OsError {
    /// `sched_setscheduler` failed.
    #[error("sched_setscheduler failed: {0}")]
    SchedSetScheduler(#[source] std::io::Error),

    /// `sched_setaffinity` failed.
    #[error("sched_setaffinity failed: {0}")]
    SchedSetAffinity(#[source] nix::Error),

    /// `mlockall` failed.
    #[error("mlockall failed: {0}")]
    MLockAll(#[source] nix::Error),

    /// `clock_gettime` failed.
    #[error("clock_gettime failed: {0}")]
    ClockGetTime(#[source] nix::Error),

    /// `clock_nanosleep` failed.
    #[error("clock_nanosleep failed: {0}")]
    ClockNanoSleep(#[source] nix::Error),
}

/// Errors surfaced by the RT Executive (§4.11) during a tick.
#[derive(Debug, Error)]
pub enum ExecutiveError {
    /// An underlying OS primitive failed.
    #[error(transparent)]
    Os(#[from] OsError),
}
