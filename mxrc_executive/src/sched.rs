//! Time & Scheduling Primitives (C1).
//!
//! `set_rt_scheduler`/`pin_to_cpu`/`lock_all_memory` configure the calling
//! thread for hard real-time execution and require `CAP_SYS_NICE`/
//! `CAP_IPC_LOCK` in production; they are gated behind the `rt` feature and
//! are a no-op on a development machine without those capabilities, the
//! same split the reference workspace's `rt_set_scheduler`/`rt_set_affinity`/
//! `rt_mlockall` use. `monotonic_now_ns`/`sleep_until_ns` always hit the real
//! clock — they need no elevated privilege and the Executive's pacing
//! depends on them in both modes.

use crate::error::OsError;
use nix::time::{clock_gettime, clock_nanosleep, ClockId, ClockNanosleepFlags};

/// Real-time scheduling policy for [`set_rt_scheduler`].
///
/// Only `SCHED_FIFO` is supported — the only policy the data model calls
/// for (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    /// `SCHED_FIFO`.
    Fifo,
}

impl SchedPolicy {
    const fn as_raw(self) -> libc::c_int {
        match self {
            Self::Fifo => libc::SCHED_FIFO,
        }
    }
}

/// Configure the calling thread's scheduling policy and priority
/// (1..=99 for `SCHED_FIFO`).
#[cfg(feature = "rt")]
pub fn set_rt_scheduler(policy: SchedPolicy, priority: i32) -> Result<(), OsError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    let rc = unsafe { libc::sched_setscheduler(0, policy.as_raw(), &param) };
    if rc != 0 {
        return Err(OsError::SchedSetScheduler(std::io::Error::last_os_error()));
    }
    Ok(())
}

/// No-op outside the `rt` feature: development machines rarely have
/// `CAP_SYS_NICE`, and the Executive must still run (as a plain thread).
#[cfg(not(feature = "rt"))]
pub fn set_rt_scheduler(_policy: SchedPolicy, _priority: i32) -> Result<(), OsError> {
    Ok(())
}

/// Restrict the calling thread to a single CPU core.
#[cfg(feature = "rt")]
pub fn pin_to_cpu(core: usize) -> Result<(), OsError> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut set = CpuSet::new();
    set.set(core).map_err(OsError::SchedSetAffinity)?;
    sched_setaffinity(Pid::from_raw(0), &set).map_err(OsError::SchedSetAffinity)
}

#[cfg(not(feature = "rt"))]
pub fn pin_to_cpu(_core: usize) -> Result<(), OsError> {
    Ok(())
}

/// Prevent paging of the process's current and future memory mappings.
#[cfg(feature = "rt")]
pub fn lock_all_memory() -> Result<(), OsError> {
    use nix::sys::mman::{mlockall, MlockAllFlags};
    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE).map_err(OsError::MLockAll)
}

#[cfg(not(feature = "rt"))]
pub fn lock_all_memory() -> Result<(), OsError> {
    Ok(())
}

/// A wall-free, never-rewinds clock reading in nanoseconds.
pub fn monotonic_now_ns() -> Result<u64, OsError> {
    let ts = clock_gettime(ClockId::CLOCK_MONOTONIC).map_err(OsError::ClockGetTime)?;
    Ok(ts.tv_sec() as u64 * 1_000_000_000 + ts.tv_nsec() as u64)
}

/// Block the calling thread until the absolute monotonic deadline
/// `deadline_ns`. Waking early on a signal is benign — the caller's loop
/// simply re-checks the clock and, if short, calls this again.
pub fn sleep_until_ns(deadline_ns: u64) -> Result<(), OsError> {
    let deadline = nix::sys::time::TimeSpec::new(
        (deadline_ns / 1_000_000_000) as i64,
        (deadline_ns % 1_000_000_000) as i64,
    );
    loop {
        match clock_nanosleep(
            ClockId::CLOCK_MONOTONIC,
            ClockNanosleepFlags::TIMER_ABSTIME,
            &deadline,
        ) {
            Ok(_) => return Ok(()),
            Err(nix::Error::EINTR) => {
                let now = monotonic_now_ns()?;
                if now >= deadline_ns {
                    return Ok(());
                }
                continue;
            }
            Err(e) => return Err(OsError::ClockNanoSleep(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_is_nondecreasing() {
        let a = monotonic_now_ns().unwrap();
        let b = monotonic_now_ns().unwrap();
        assert!(b >= a);
    }

    #[test]
    fn sleep_until_past_deadline_returns_immediately() {
        let now = monotonic_now_ns().unwrap();
        sleep_until_ns(now.saturating_sub(1_000_000)).unwrap();
    }

    #[test]
    fn no_rt_scheduling_primitives_are_noops_without_feature() {
        assert!(set_rt_scheduler(SchedPolicy::Fifo, 50).is_ok());
        assert!(pin_to_cpu(0).is_ok());
        assert!(lock_all_memory().is_ok());
    }
}
