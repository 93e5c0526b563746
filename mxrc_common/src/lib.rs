//! CORE Common Library
//!
//! Shared data model, constants, and configuration loading used by every
//! crate in the workspace: `mxrc_store`, `mxrc_executive`, `mxrc_ethercat`,
//! and the `mxrc` binary.
//!
//! # Module Structure
//!
//! - [`data_key`] - `DataKey`, the fixed enumeration of Data Store slots
//! - [`data_type`] - `DataType`, the tagged-union discriminator
//! - [`consts`] - system-wide numeric limits and defaults
//! - [`config`] - YAML configuration loading (EtherCAT master/slave schema)
//! - [`prelude`] - common re-exports for convenience

pub mod config;
pub mod consts;
pub mod data_key;
pub mod data_type;
pub mod prelude;
