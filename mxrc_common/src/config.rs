//! Configuration loading traits and types.
//!
//! Provides the `ConfigLoader` trait for generic YAML configuration loading,
//! plus the concrete EtherCAT master/slave configuration schema consumed by
//! the Cycle Driver to resolve PDO offsets (§4.8/§4.9 of the data model).
//!
//! # Usage
//!
//! ```rust,no_run
//! use mxrc_common::config::{EtherCatConfig, ConfigLoader};
//! use std::path::Path;
//!
//! let cfg = EtherCatConfig::load(Path::new("slaves.yaml")).expect("load slave config");
//! println!("slaves: {}", cfg.slaves.len());
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Log level for configuration (drives the `tracing` env filter default).
///
/// Serializes to lowercase strings: "trace", "debug", "info", "warn", "error".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level verbosity.
    Trace,
    /// Debug-level verbosity.
    Debug,
    /// Info-level verbosity (default).
    Info,
    /// Warning-level verbosity.
    Warn,
    /// Error-level verbosity.
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

/// Error type for configuration loading operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// YAML parsing failed.
    #[error("failed to parse configuration {path}: {source}")]
    ParseError {
        /// Path of the file that failed to parse.
        path: String,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),

    /// Generic I/O error reading the configuration file.
    #[error("I/O error reading configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Common configuration fields shared across all CORE programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Minimum log level emitted by `tracing`.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Service name used in log output and event payloads.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from YAML files.
///
/// Provides a default implementation for any type implementing
/// `serde::de::DeserializeOwned`.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::FileNotFound` if the file does not exist,
    /// `ConfigError::ParseError` if the YAML is malformed.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::Io(e)
            }
        })?;

        serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.display().to_string(),
            source,
        })
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── EtherCAT master/slave configuration (§6 External Interfaces) ──

/// `master.{index,cycle_time_ns,priority,cpu_affinity}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasterConfig {
    /// EtherCAT master index (usually 0).
    pub index: u32,
    /// RT Executive minor cycle time in nanoseconds.
    pub cycle_time_ns: u64,
    /// SCHED_FIFO priority (1..=99) for the RT Executive thread.
    pub priority: i32,
    /// CPU core the RT Executive thread is pinned to.
    pub cpu_affinity: usize,
}

/// One entry in a slave's `pdo_mappings[]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdoMapping {
    /// PDO index, e.g. `0x1A00`.
    pub index: u16,
    /// PDO subindex.
    pub subindex: u8,
    /// Human-readable name (e.g. `"position"`, `"velocity"`).
    pub name: String,
    /// Encoded primitive type: `"int16"|"int32"|"float"|"double"|"uint8"|"uint16"`.
    pub data_type: String,
    /// Byte offset of this field within the slave's domain buffer region.
    pub byte_offset: usize,
}

/// `slaves[].{alias,position,vendor_id,product_code,device_name,device_type,pdo_mappings[]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlaveConfig {
    /// Station alias.
    pub alias: u16,
    /// Bus position (0-based, in scan order).
    pub position: u16,
    /// EtherCAT vendor ID.
    pub vendor_id: u32,
    /// EtherCAT product code.
    pub product_code: u32,
    /// Human-readable device name.
    pub device_name: String,
    /// Device class, e.g. `"bldc_drive"`, `"servo_drive"`, `"io_module"`.
    pub device_type: String,
    /// PDO field mappings for this slave.
    #[serde(default)]
    pub pdo_mappings: Vec<PdoMapping>,
}

/// `dc_config.{enable,reference_slave,sync0_cycle_time,sync0_shift_time,sync1_cycle_time}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DcConfig {
    /// Whether Distributed Clocks synchronization is enabled.
    pub enable: bool,
    /// Slave position used as the DC reference clock.
    pub reference_slave: u16,
    /// SYNC0 cycle time in nanoseconds.
    pub sync0_cycle_time: u64,
    /// SYNC0 shift time in nanoseconds (may be negative).
    pub sync0_shift_time: i64,
    /// SYNC1 cycle time in nanoseconds.
    pub sync1_cycle_time: u64,
}

/// Top-level EtherCAT master/slave configuration — loaded from a
/// collaborator-owned YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EtherCatConfig {
    /// Master configuration.
    pub master: MasterConfig,
    /// Slave descriptors, in bus order.
    pub slaves: Vec<SlaveConfig>,
    /// Distributed Clocks configuration.
    pub dc_config: DcConfig,
}

impl EtherCatConfig {
    /// Validate structural and numeric constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for an empty slave list, an
    /// out-of-range priority/cycle time, a duplicate slave alias, or a
    /// `dc_config.reference_slave` that names no configured slave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slaves.is_empty() {
            return Err(ConfigError::ValidationError(
                "slaves[] must not be empty".to_string(),
            ));
        }
        if !(1..=99).contains(&self.master.priority) {
            return Err(ConfigError::ValidationError(format!(
                "master.priority={} out of range [1, 99]",
                self.master.priority
            )));
        }
        if self.master.cycle_time_ns == 0 {
            return Err(ConfigError::ValidationError(
                "master.cycle_time_ns must be > 0".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for slave in &self.slaves {
            if !seen.insert(slave.alias) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate slave alias {}",
                    slave.alias
                )));
            }
        }

        if self.dc_config.enable
            && !self
                .slaves
                .iter()
                .any(|s| s.position == self.dc_config.reference_slave)
        {
            return Err(ConfigError::ValidationError(format!(
                "dc_config.reference_slave={} does not name a configured slave",
                self.dc_config.reference_slave
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
master:
  index: 0
  cycle_time_ns: 1000000
  priority: 80
  cpu_affinity: 2
slaves:
  - alias: 1
    position: 0
    vendor_id: 0x1234
    product_code: 0x5678
    device_name: "Axis 0 BLDC"
    device_type: "bldc_drive"
    pdo_mappings:
      - index: 0x1602
        subindex: 2
        name: "velocity"
        data_type: "int32"
        byte_offset: 2
dc_config:
  enable: true
  reference_slave: 0
  sync0_cycle_time: 1000000
  sync0_shift_time: 0
  sync1_cycle_time: 1000000
"#
    }

    #[test]
    fn parses_sample_yaml() {
        let cfg: EtherCatConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(cfg.slaves.len(), 1);
        assert_eq!(cfg.slaves[0].device_type, "bldc_drive");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_empty_slave_list() {
        let cfg = EtherCatConfig {
            master: MasterConfig {
                index: 0,
                cycle_time_ns: 1_000_000,
                priority: 80,
                cpu_affinity: 0,
            },
            slaves: vec![],
            dc_config: DcConfig {
                enable: false,
                reference_slave: 0,
                sync0_cycle_time: 1_000_000,
                sync0_shift_time: 0,
                sync1_cycle_time: 1_000_000,
            },
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn rejects_duplicate_alias() {
        let mut cfg: EtherCatConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let dup = cfg.slaves[0].clone();
        cfg.slaves.push(dup);
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn rejects_dangling_dc_reference() {
        let mut cfg: EtherCatConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        cfg.dc_config.reference_slave = 99;
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn rejects_priority_out_of_range() {
        let mut cfg: EtherCatConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        cfg.master.priority = 100;
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn shared_config_rejects_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: String::new(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn log_level_defaults_to_info() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
