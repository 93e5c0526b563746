//! System-wide constants for the CORE workspace.
//!
//! Single source of truth for all numeric limits and default paths.
//! Imported by all crates — no duplication permitted.

/// Maximum number of DataKey entries (dense array index bound).
pub const MAX_KEYS: usize = 512;

/// Default minor cycle time in microseconds (1 kHz = 1000 µs).
pub const CYCLE_TIME_US: u64 = 1000;

/// Minimum allowed minor cycle time [µs] for runtime config.
pub const CYCLE_TIME_US_MIN: u32 = 100;

/// Maximum allowed minor cycle time [µs] for runtime config.
pub const CYCLE_TIME_US_MAX: u32 = 10_000;

/// Heartbeat timeout, compile-time constant per the data model (~500ms).
///
/// Override is a build option only — there is no runtime knob.
pub const HEARTBEAT_TIMEOUT_NS: u64 = 500_000_000;

/// Consecutive-error threshold past which the Cycle Driver escalates to SAFE_MODE.
pub const ERROR_THRESHOLD: u32 = 10;

/// Default shared memory region name.
pub const SHM_REGION_NAME: &str = "/mxrc_shm";

/// Maximum registered sensor descriptors (RT-safe fixed capacity).
pub const MAX_SENSORS: usize = 128;

/// Maximum registered output descriptors (RT-safe fixed capacity).
pub const MAX_OUTPUTS: usize = 128;

/// Maximum registered motor descriptors (RT-safe fixed capacity).
pub const MAX_MOTORS: usize = 64;

/// Maximum registered periodic actions in the RT Executive.
pub const MAX_PERIODIC_ACTIONS: usize = 32;

/// Maximum EtherCAT slaves describable in a single YAML configuration.
pub const MAX_SLAVES: usize = 64;

/// Maximum PDO mapping entries per slave.
pub const MAX_PDO_MAPPINGS: usize = 32;

/// Default configuration directory path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mxrc/config";

/// Minimum shared memory segment size in bytes (one memory page).
pub const SHM_MIN_SIZE: usize = 4096;

/// Maximum shared memory segment size in bytes.
pub const SHM_MAX_SIZE: usize = 1_073_741_824;

/// CPU cache line size in bytes, used for alignment to prevent false sharing.
pub const CACHE_LINE_SIZE: usize = 64;
