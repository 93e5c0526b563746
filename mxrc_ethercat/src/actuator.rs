//! Actuator Write Stage (C9) — §4.9.
//!
//! Grounded on `evo_control_unit::cycle::CycleRunner::cycle_body`'s write
//! phase together with `evo_control_unit::safety`/`command::arbitration`'s
//! envelope-checking style: every command is validated against a
//! per-drive-kind envelope before it ever touches the domain buffer, and
//! an invalid command is dropped rather than clamped.

use mxrc_common::config::SlaveConfig;
use mxrc_common::data_key::DataKey;
use mxrc_store::DataStore;
use std::f64::consts::TAU;
use tracing::warn;

use crate::pdo::{self, PdoDataType};

const MAX_ROTATION_POSITION: f64 = TAU;
const MAX_LINEAR_POSITION: f64 = 10.0;
const BLDC_MAX_VELOCITY_RPM: f64 = 10_000.0;
const BLDC_MAX_TORQUE_NM: f64 = 100.0;

fn find_mapping<'a>(slave: &'a SlaveConfig, name: &str) -> Option<&'a mxrc_common::config::PdoMapping> {
    slave.pdo_mappings.iter().find(|m| m.name == name)
}

/// An analog/digital output (§4.9, "outputs").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// `DO`: a single bit in the domain's output bitmap byte.
    Digital,
    /// `AO`: a typed analog value, range-checked.
    Analog,
}

/// A single output descriptor, resolved once against the slave
/// configuration.
pub struct OutputDescriptor {
    name: String,
    kind: OutputKind,
    store_key: DataKey,
    channel: u8,
    min: f64,
    max: f64,
    offset: Option<usize>,
    value_type: Option<PdoDataType>,
}

impl OutputDescriptor {
    /// Resolve a digital output at `channel` against `slave`'s `"do_bitmap"`
    /// mapping.
    #[must_use]
    pub fn digital(name: impl Into<String>, store_key: DataKey, channel: u8, slave: &SlaveConfig) -> Self {
        let mapping = find_mapping(slave, "do_bitmap");
        Self {
            name: name.into(),
            kind: OutputKind::Digital,
            store_key,
            channel,
            min: 0.0,
            max: 1.0,
            offset: mapping.map(|m| m.byte_offset),
            value_type: None,
        }
    }

    /// Resolve an analog output against `slave`'s `"ao"` mapping, with a
    /// valid range of `[min, max]`.
    #[must_use]
    pub fn analog(name: impl Into<String>, store_key: DataKey, min: f64, max: f64, slave: &SlaveConfig) -> Self {
        let mapping = find_mapping(slave, "ao");
        Self {
            name: name.into(),
            kind: OutputKind::Analog,
            store_key,
            channel: 0,
            min,
            max,
            offset: mapping.map(|m| m.byte_offset),
            value_type: mapping.and_then(|m| PdoDataType::parse(&m.data_type)),
        }
    }
}

/// Write one output into the domain buffer from the Data Store. A missing
/// key or missing PDO mapping is skipped without error (§4.9); an
/// out-of-range analog value is rejected and logged.
pub fn write_output(desc: &OutputDescriptor, store: &DataStore, domain: &mut [u8]) -> bool {
    let Some(offset) = desc.offset else {
        return false;
    };
    match desc.kind {
        OutputKind::Digital => {
            let mut raw = 0i32;
            if store.get_i32(desc.store_key.as_index(), &mut raw).is_err() {
                return false;
            }
            let bit = raw.clamp(0, 1) != 0;
            pdo::write_bit(domain, offset, desc.channel, bit)
        }
        OutputKind::Analog => {
            let mut value = 0.0f64;
            if store.get_f64(desc.store_key.as_index(), &mut value).is_err() {
                return false;
            }
            if value < desc.min || value > desc.max {
                warn!(output = desc.name.as_str(), value, "analog output out of range, dropped");
                return false;
            }
            let Some(ty) = desc.value_type else {
                return false;
            };
            pdo::write_from_f64(domain, offset, ty, value)
        }
    }
}

/// Which drive personality a [`MotorDescriptor`] commands (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorKind {
    /// BLDC drive: VELOCITY and TORQUE only.
    Bldc,
    /// Servo drive: POSITION, VELOCITY, and TORQUE.
    Servo,
}

/// `Motor0Mode`'s encoding (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorMode {
    /// No motion command is issued.
    Disabled,
    /// Position control.
    Position,
    /// Velocity control.
    Velocity,
    /// Torque control.
    Torque,
}

impl MotorMode {
    fn from_i32(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Disabled),
            1 => Some(Self::Position),
            2 => Some(Self::Velocity),
            3 => Some(Self::Torque),
            _ => None,
        }
    }
}

/// A resolved, validated command about to be encoded into the domain
/// buffer, or the "safe" (disabled) command.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MotorCommand {
    mode: MotorMode,
    position: f64,
    velocity: f64,
    torque: f64,
}

impl MotorCommand {
    const fn safe() -> Self {
        Self {
            mode: MotorMode::Disabled,
            position: 0.0,
            velocity: 0.0,
            torque: 0.0,
        }
    }
}

/// A motor descriptor: which Data Store keys drive it, which PDO offsets
/// receive the encoded command, and which envelope it must satisfy.
pub struct MotorDescriptor {
    name: String,
    kind: MotorKind,
    mode_key: DataKey,
    enable_key: DataKey,
    position_key: DataKey,
    velocity_key: DataKey,
    torque_key: DataKey,
    max_velocity: f64,
    max_torque: f64,
    control_offset: Option<usize>,
    position_offset: Option<usize>,
    velocity_offset: Option<usize>,
    torque_offset: Option<usize>,
    value_type: PdoDataType,
}

impl MotorDescriptor {
    /// Resolve a BLDC motor descriptor (`0x1602`: `control_word`,
    /// `target_velocity`, `target_torque`).
    #[must_use]
    pub fn bldc(
        name: impl Into<String>,
        mode_key: DataKey,
        enable_key: DataKey,
        velocity_key: DataKey,
        torque_key: DataKey,
        slave: &SlaveConfig,
    ) -> Self {
        Self::resolve(
            name,
            MotorKind::Bldc,
            mode_key,
            enable_key,
            velocity_key, // position_key unused for BLDC; reuse velocity_key as a harmless placeholder
            velocity_key,
            torque_key,
            BLDC_MAX_VELOCITY_RPM,
            BLDC_MAX_TORQUE_NM,
            slave,
        )
    }

    /// Resolve a Servo motor descriptor (`0x1603`: `control_word`,
    /// `target_position`, `target_velocity`, `target_torque`).
    #[must_use]
    pub fn servo(
        name: impl Into<String>,
        mode_key: DataKey,
        enable_key: DataKey,
        position_key: DataKey,
        velocity_key: DataKey,
        torque_key: DataKey,
        max_velocity: f64,
        max_torque: f64,
        slave: &SlaveConfig,
    ) -> Self {
        Self::resolve(
            name,
            MotorKind::Servo,
            mode_key,
            enable_key,
            position_key,
            velocity_key,
            torque_key,
            max_velocity,
            max_torque,
            slave,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve(
        name: impl Into<String>,
        kind: MotorKind,
        mode_key: DataKey,
        enable_key: DataKey,
        position_key: DataKey,
        velocity_key: DataKey,
        torque_key: DataKey,
        max_velocity: f64,
        max_torque: f64,
        slave: &SlaveConfig,
    ) -> Self {
        let control = find_mapping(slave, "control_word");
        let position = find_mapping(slave, "target_position");
        let velocity = find_mapping(slave, "target_velocity");
        let torque = find_mapping(slave, "target_torque");
        let value_type = velocity
            .or(torque)
            .or(position)
            .and_then(|m| PdoDataType::parse(&m.data_type))
            .unwrap_or(PdoDataType::Int32);

        Self {
            name: name.into(),
            kind,
            mode_key,
            enable_key,
            position_key,
            velocity_key,
            torque_key,
            max_velocity,
            max_torque,
            control_offset: control.map(|m| m.byte_offset),
            position_offset: position.map(|m| m.byte_offset),
            velocity_offset: velocity.map(|m| m.byte_offset),
            torque_offset: torque.map(|m| m.byte_offset),
            value_type,
        }
    }

    fn validate(&self, mode: MotorMode, position: f64, velocity: f64, torque: f64) -> Option<MotorCommand> {
        match (self.kind, mode) {
            (_, MotorMode::Disabled) => Some(MotorCommand::safe()),
            (MotorKind::Bldc, MotorMode::Position) => None,
            (MotorKind::Bldc, MotorMode::Velocity) => {
                (velocity.abs() <= self.max_velocity).then_some(MotorCommand {
                    mode,
                    position: 0.0,
                    velocity,
                    torque: 0.0,
                })
            }
            (MotorKind::Bldc, MotorMode::Torque) => {
                (torque.abs() <= self.max_torque).then_some(MotorCommand {
                    mode,
                    position: 0.0,
                    velocity: 0.0,
                    torque,
                })
            }
            (MotorKind::Servo, MotorMode::Position) => {
                let in_range = position.abs() <= MAX_ROTATION_POSITION || position.abs() <= MAX_LINEAR_POSITION;
                let velocity_ok = (0.0..=self.max_velocity).contains(&velocity);
                (in_range && velocity_ok).then_some(MotorCommand {
                    mode,
                    position,
                    velocity,
                    torque: 0.0,
                })
            }
            (MotorKind::Servo, MotorMode::Velocity) => {
                (0.0..=self.max_velocity).contains(&velocity).then_some(MotorCommand {
                    mode,
                    position: 0.0,
                    velocity,
                    torque: 0.0,
                })
            }
            (MotorKind::Servo, MotorMode::Torque) => {
                (0.0..=self.max_torque).contains(&torque).then_some(MotorCommand {
                    mode,
                    position: 0.0,
                    velocity: 0.0,
                    torque,
                })
            }
        }
    }

    fn encode(&self, command: &MotorCommand, domain: &mut [u8]) -> bool {
        let Some(control_offset) = self.control_offset else {
            return false;
        };
        let control_word: i32 = if matches!(command.mode, MotorMode::Disabled) {
            0
        } else {
            1
        };
        if !pdo::write_i32(domain, control_offset, control_word) {
            return false;
        }
        match command.mode {
            MotorMode::Disabled => true,
            MotorMode::Position => self
                .position_offset
                .is_some_and(|o| pdo::write_from_f64(domain, o, self.value_type, command.position)),
            MotorMode::Velocity => self
                .velocity_offset
                .is_some_and(|o| pdo::write_from_f64(domain, o, self.value_type, command.velocity)),
            MotorMode::Torque => self
                .torque_offset
                .is_some_and(|o| pdo::write_from_f64(domain, o, self.value_type, command.torque)),
        }
    }
}

/// Read, validate, and encode one motor's command for this cycle. Returns
/// `true` iff a command (including the "safe" disabled command) was
/// successfully encoded — the caller counts this toward
/// `motor_command_count` (§4.9). Missing keys are skipped without error;
/// invalid commands are dropped with a warning and never mutate the
/// domain buffer.
pub fn write_motor_command(desc: &MotorDescriptor, store: &DataStore, domain: &mut [u8]) -> bool {
    let mut mode_raw = 0i32;
    let mut enable_raw = 0i32;
    if store.get_i32(desc.mode_key.as_index(), &mut mode_raw).is_err()
        || store.get_i32(desc.enable_key.as_index(), &mut enable_raw).is_err()
    {
        return false;
    }
    let Some(mode) = MotorMode::from_i32(mode_raw) else {
        return false;
    };

    let effective_mode = if enable_raw == 0 { MotorMode::Disabled } else { mode };

    let mut position = 0.0f64;
    let mut velocity = 0.0f64;
    let mut torque = 0.0f64;
    let _ = store.get_f64(desc.position_key.as_index(), &mut position);
    let _ = store.get_f64(desc.velocity_key.as_index(), &mut velocity);
    let _ = store.get_f64(desc.torque_key.as_index(), &mut torque);

    let Some(command) = desc.validate(effective_mode, position, velocity, torque) else {
        warn!(motor = desc.name.as_str(), ?effective_mode, "motor command failed validation, dropped");
        return false;
    };

    desc.encode(&command, domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxrc_common::config::PdoMapping;

    fn slave_with(mappings: Vec<PdoMapping>) -> SlaveConfig {
        SlaveConfig {
            alias: 0,
            position: 0,
            vendor_id: 1,
            product_code: 1,
            device_name: "test".into(),
            device_type: "bldc_drive".into(),
            pdo_mappings: mappings,
        }
    }

    fn fresh_store() -> Box<DataStore> {
        let layout = std::alloc::Layout::new::<DataStore>();
        let raw = unsafe { std::alloc::alloc_zeroed(layout) } as *mut DataStore;
        unsafe { Box::from_raw(raw) }
    }

    fn bldc_mappings() -> Vec<PdoMapping> {
        vec![
            PdoMapping { index: 0x1602, subindex: 1, name: "control_word".into(), data_type: "int32".into(), byte_offset: 0 },
            PdoMapping { index: 0x1602, subindex: 2, name: "target_velocity".into(), data_type: "float".into(), byte_offset: 4 },
            PdoMapping { index: 0x1602, subindex: 3, name: "target_torque".into(), data_type: "float".into(), byte_offset: 8 },
        ]
    }

    #[test]
    fn bldc_rejects_position_mode() {
        let slave = slave_with(bldc_mappings());
        let desc = MotorDescriptor::bldc(
            "m0",
            DataKey::Motor0Mode,
            DataKey::Motor0Enable,
            DataKey::Motor0Velocity,
            DataKey::Motor0Torque,
            &slave,
        );
        let store = fresh_store();
        store.set_i32(DataKey::Motor0Mode.as_index(), 1).unwrap(); // Position
        store.set_i32(DataKey::Motor0Enable.as_index(), 1).unwrap();
        let mut domain = [0u8; 16];
        assert!(!write_motor_command(&desc, &store, &mut domain));
    }

    #[test]
    fn bldc_accepts_velocity_within_envelope() {
        let slave = slave_with(bldc_mappings());
        let desc = MotorDescriptor::bldc(
            "m0",
            DataKey::Motor0Mode,
            DataKey::Motor0Enable,
            DataKey::Motor0Velocity,
            DataKey::Motor0Torque,
            &slave,
        );
        let store = fresh_store();
        store.set_i32(DataKey::Motor0Mode.as_index(), 2).unwrap(); // Velocity
        store.set_i32(DataKey::Motor0Enable.as_index(), 1).unwrap();
        store.set_f64(DataKey::Motor0Velocity.as_index(), 5000.0).unwrap();
        let mut domain = [0u8; 16];
        assert!(write_motor_command(&desc, &store, &mut domain));
        assert_eq!(pdo::read_i32(&domain, 0), Some(1));
    }

    #[test]
    fn bldc_rejects_velocity_exceeding_envelope() {
        let slave = slave_with(bldc_mappings());
        let desc = MotorDescriptor::bldc(
            "m0",
            DataKey::Motor0Mode,
            DataKey::Motor0Enable,
            DataKey::Motor0Velocity,
            DataKey::Motor0Torque,
            &slave,
        );
        let store = fresh_store();
        store.set_i32(DataKey::Motor0Mode.as_index(), 2).unwrap();
        store.set_i32(DataKey::Motor0Enable.as_index(), 1).unwrap();
        store.set_f64(DataKey::Motor0Velocity.as_index(), 20_000.0).unwrap();
        let mut domain = [0u8; 16];
        assert!(!write_motor_command(&desc, &store, &mut domain));
        assert_eq!(pdo::read_i32(&domain, 0), Some(0));
    }

    #[test]
    fn disabled_enable_flag_emits_safe_command() {
        let slave = slave_with(bldc_mappings());
        let desc = MotorDescriptor::bldc(
            "m0",
            DataKey::Motor0Mode,
            DataKey::Motor0Enable,
            DataKey::Motor0Velocity,
            DataKey::Motor0Torque,
            &slave,
        );
        let store = fresh_store();
        store.set_i32(DataKey::Motor0Mode.as_index(), 2).unwrap();
        store.set_i32(DataKey::Motor0Enable.as_index(), 0).unwrap();
        store.set_f64(DataKey::Motor0Velocity.as_index(), 5000.0).unwrap();
        let mut domain = [0xFFu8; 16];
        assert!(write_motor_command(&desc, &store, &mut domain));
        assert_eq!(pdo::read_i32(&domain, 0), Some(0));
    }

    #[test]
    fn digital_output_writes_clamped_bit() {
        let slave = slave_with(vec![PdoMapping {
            index: 0x1602,
            subindex: 1,
            name: "do_bitmap".into(),
            data_type: "uint8".into(),
            byte_offset: 0,
        }]);
        let desc = OutputDescriptor::digital("do0", DataKey::DigitalOutput0, 1, &slave);
        let store = fresh_store();
        store.set_i32(DataKey::DigitalOutput0.as_index(), 5).unwrap(); // clamps to 1
        let mut domain = [0u8; 4];
        assert!(write_output(&desc, &store, &mut domain));
        assert_eq!(pdo::read_bit(&domain, 0, 1), Some(true));
    }

    #[test]
    fn analog_output_out_of_range_is_dropped() {
        let slave = slave_with(vec![PdoMapping {
            index: 0x1602,
            subindex: 1,
            name: "ao".into(),
            data_type: "float".into(),
            byte_offset: 0,
        }]);
        let desc = OutputDescriptor::analog("ao0", DataKey::AnalogOutput0, 0.0, 10.0, &slave);
        let store = fresh_store();
        store.set_f64(DataKey::AnalogOutput0.as_index(), 99.0).unwrap();
        let mut domain = [0u8; 4];
        assert!(!write_output(&desc, &store, &mut domain));
    }

    #[test]
    fn missing_key_is_skipped_without_error() {
        let slave = slave_with(vec![PdoMapping {
            index: 0x1602,
            subindex: 1,
            name: "ao".into(),
            data_type: "float".into(),
            byte_offset: 0,
        }]);
        let desc = OutputDescriptor::analog("ao0", DataKey::AnalogOutput0, 0.0, 10.0, &slave);
        let store = fresh_store();
        let mut domain = [0u8; 4];
        assert!(!write_output(&desc, &store, &mut domain));
    }
}
