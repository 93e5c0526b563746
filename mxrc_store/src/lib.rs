//! # mxrc_store — Shared Memory Region and Data Store
//!
//! The single POSIX-named shared memory region through which the RT
//! process and the Non-RT process exchange state: a fixed array of typed,
//! seqlock-guarded entries (the Data Store) plus the heartbeat/state-code
//! fields the two processes use to coordinate liveness.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   create()/open()   ┌──────────────────────────┐
//! │ RT process │ ───────────────────►│   SharedMemoryRegion      │
//! │ (owner)    │                     │  ┌────────────────────┐  │
//! └────────────┘                     │  │ RegionHeader        │  │
//!        ▲                           │  │ (magic, version)    │  │
//!        │ unlink() on SHUTDOWN      │  ├────────────────────┤  │
//!        │                           │  │ SharedMemoryData    │  │
//! ┌────────────┐   open()            │  │  DataStore (C3)     │  │
//! │ Non-RT     │ ───────────────────►│  │  nonrt_heartbeat_ns │  │
//! │ process    │                     │  │  rt_state_code      │  │
//! └────────────┘                     │  └────────────────────┘  │
//!                                    └──────────────────────────┘
//! ```
//!
//! ## Seqlock protocol
//!
//! Every `DataEntry` carries its own 64-bit sequence counter. Writers
//! increment it (odd = write in progress), write `(type, timestamp,
//! value)`, then increment it again (even = quiescent). Readers load the
//! counter before and after copying the payload and retry on a mismatch or
//! an odd value — the same discipline `VersionCounter` already implements
//! for whole-segment versioning, applied here per entry.
//!
//! ## Safety
//!
//! The region is opened by two independent OS processes mapping the same
//! physical pages; Rust's aliasing rules do not reach across process
//! boundaries; soundness rests entirely on this crate's constrained use of
//! `UnsafeCell` plus the seqlock discipline in `store`. No other unsafe
//! shared-memory access should be introduced without updating that audit.

#![warn(clippy::all)]

pub mod error;
pub mod platform;
pub mod region;
pub mod store;
pub mod version;

pub use error::{ShmError, ShmResult, StoreError, StoreResult};
pub use region::{SharedMemoryRegion, MXRC_SHM_MAGIC};
pub use store::{DataEntry, DataStore, SharedMemoryData};
pub use version::VersionCounter;

/// Initialize tracing for RT-safe logging: no target/thread metadata
/// allocation beyond the one-time subscriber build.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
