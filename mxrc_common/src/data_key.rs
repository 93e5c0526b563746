//! `DataKey`: the compile-time-fixed enumeration whose values double as
//! dense array indices into the Data Store.
//!
//! Keys are grouped into reserved bands so a glance at the numeric value
//! tells you which subsystem owns it. Bands leave gaps for growth without
//! renumbering existing keys; `MAX_KEYS` bounds the dense array regardless
//! of how many bands are populated.

use crate::consts::MAX_KEYS;

/// A key into the Data Store.
///
/// The discriminant is the array index. Bands:
/// - `100..=109`: sensor position/velocity pairs (RT-owned).
/// - `120..=129`: sensor torque (RT-owned).
/// - `130..=141`: digital inputs (RT-owned).
/// - `142..=149`: analog inputs (RT-owned).
/// - `150..=159`: digital outputs (Non-RT-owned command band).
/// - `160..=169`: analog outputs (Non-RT-owned command band).
/// - `200..=207`: motor command set (Non-RT-owned command band).
/// - `300..=319`: master/system status (RT-owned).
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKey {
    /// Axis 0 position, physical units, RT-owned.
    SensorPosition0 = 100,
    /// Axis 0 velocity, physical units, RT-owned.
    SensorVelocity0 = 101,
    /// Axis 1 position, physical units, RT-owned.
    SensorPosition1 = 102,
    /// Axis 1 velocity, physical units, RT-owned.
    SensorVelocity1 = 103,

    /// Axis 0 torque (Tz), RT-owned.
    SensorTorque0 = 120,
    /// Axis 1 torque (Tz), RT-owned.
    SensorTorque1 = 121,

    /// Digital input channel 0, RT-owned.
    DigitalInput0 = 130,
    /// Digital input channel 1, RT-owned.
    DigitalInput1 = 131,

    /// Analog input channel 0, RT-owned.
    AnalogInput0 = 142,
    /// Analog input channel 1, RT-owned.
    AnalogInput1 = 143,

    /// Digital output channel 0, Non-RT command band.
    DigitalOutput0 = 150,
    /// Digital output channel 1, Non-RT command band.
    DigitalOutput1 = 151,

    /// Analog output channel 0, Non-RT command band.
    AnalogOutput0 = 160,
    /// Analog output channel 1, Non-RT command band.
    AnalogOutput1 = 161,

    /// Motor 0 target position, Non-RT command band.
    Motor0Position = 200,
    /// Motor 0 target velocity, Non-RT command band.
    Motor0Velocity = 201,
    /// Motor 0 target torque, Non-RT command band.
    Motor0Torque = 202,
    /// Motor 0 control mode (`DISABLED|POSITION|VELOCITY|TORQUE`), Non-RT command band.
    Motor0Mode = 203,
    /// Motor 0 enable flag, Non-RT command band.
    Motor0Enable = 204,

    /// EtherCAT master active flag, RT-owned status.
    MasterActive = 300,
    /// EtherCAT master consecutive error count, RT-owned status.
    MasterErrorCount = 301,
    /// Total cycles executed, RT-owned status.
    MasterCycleCount = 302,
    /// Current RT state machine state code, RT-owned status.
    RtStateCode = 303,
    /// RT process heartbeat mirror, RT-owned status.
    RtHeartbeatNs = 304,
    /// Number of times SAFE_MODE has been entered, RT-owned status.
    SafeModeEntryCount = 305,
    /// Number of missed deadlines, RT-owned status.
    DeadlineMissCount = 306,
}

impl DataKey {
    /// This key's dense array index into the Data Store.
    #[must_use]
    pub const fn as_index(self) -> usize {
        self as u16 as usize
    }

    /// Whether this key belongs to a Non-RT-owned command band.
    ///
    /// RT never writes a command-band key; Non-RT never writes outside one.
    #[must_use]
    pub const fn is_command_band(self) -> bool {
        matches!(
            self,
            Self::DigitalOutput0
                | Self::DigitalOutput1
                | Self::AnalogOutput0
                | Self::AnalogOutput1
                | Self::Motor0Position
                | Self::Motor0Velocity
                | Self::Motor0Torque
                | Self::Motor0Mode
                | Self::Motor0Enable
        )
    }
}

static_assertions::const_assert!(DataKey::DeadlineMissCount.as_index() < MAX_KEYS);
static_assertions::const_assert!(DataKey::Motor0Enable.as_index() < MAX_KEYS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_fits_within_max_keys() {
        let keys = [
            DataKey::SensorPosition0,
            DataKey::SensorVelocity0,
            DataKey::SensorTorque0,
            DataKey::DigitalInput0,
            DataKey::AnalogInput0,
            DataKey::DigitalOutput0,
            DataKey::AnalogOutput0,
            DataKey::Motor0Position,
            DataKey::Motor0Mode,
            DataKey::MasterActive,
            DataKey::DeadlineMissCount,
        ];
        for k in keys {
            assert!(k.as_index() < MAX_KEYS);
        }
    }

    #[test]
    fn command_band_classification_matches_ownership_rule() {
        assert!(DataKey::Motor0Position.is_command_band());
        assert!(DataKey::DigitalOutput0.is_command_band());
        assert!(!DataKey::SensorPosition0.is_command_band());
        assert!(!DataKey::MasterActive.is_command_band());
    }

    #[test]
    fn bands_do_not_overlap() {
        assert!(DataKey::SensorPosition0.as_index() < DataKey::SensorTorque0.as_index());
        assert!(DataKey::SensorTorque0.as_index() < DataKey::DigitalInput0.as_index());
        assert!(DataKey::AnalogOutput1.as_index() < DataKey::Motor0Position.as_index());
        assert!(DataKey::Motor0Enable.as_index() < DataKey::MasterActive.as_index());
    }
}
