//! Prelude module for common re-exports.
//!
//! # Usage
//!
//! ```rust
//! use mxrc_common::prelude::*;
//! ```

// ─── Data Model ─────────────────────────────────────────────────────
pub use crate::data_key::DataKey;
pub use crate::data_type::{DataType, STRING32_LEN};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{
    CYCLE_TIME_US, ERROR_THRESHOLD, HEARTBEAT_TIMEOUT_NS, MAX_KEYS, SHM_REGION_NAME,
};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, EtherCatConfig, LogLevel, SharedConfig};
