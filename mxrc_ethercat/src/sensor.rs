//! Sensor Read Stage (C8) — §4.8.
//!
//! Grounded on `evo_control_unit::cycle::CycleRunner::cycle_body`'s read
//! phase: resolve PDO offsets once against the slave configuration, then
//! do a bounded, allocation-free decode every cycle. Generalized from one
//! fixed feedback shape into the five sensor kinds §4.8 names.

use mxrc_common::config::SlaveConfig;
use mxrc_common::data_key::DataKey;
use mxrc_store::DataStore;
use tracing::debug;

use crate::pdo::{self, PdoDataType};

/// What kind of feedback a [`SensorDescriptor`] decodes (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Two INT32 fields (position, velocity), scaled to physical units.
    Position,
    /// One DOUBLE field.
    Velocity,
    /// 6-axis torque block; only `torque_z` is kept.
    Torque,
    /// A single bit in a digital-input bitmap byte.
    Di,
    /// A typed analog channel, widened to DOUBLE.
    Ai,
}

/// PDO field names this stage looks for in a slave's `pdo_mappings[]`,
/// per [`SensorKind`].
fn field_names(kind: SensorKind) -> &'static [&'static str] {
    match kind {
        SensorKind::Position => &["position", "velocity"],
        SensorKind::Velocity => &["velocity"],
        SensorKind::Torque => &["torque_z"],
        SensorKind::Di => &["di_bitmap"],
        SensorKind::Ai => &["ai"],
    }
}

fn find_mapping<'a>(slave: &'a SlaveConfig, name: &str) -> Option<&'a mxrc_common::config::PdoMapping> {
    slave.pdo_mappings.iter().find(|m| m.name == name)
}

/// A sensor descriptor, resolved once at startup against the slave
/// configuration and then reused every cycle.
pub struct SensorDescriptor {
    name: String,
    kind: SensorKind,
    primary_key: DataKey,
    secondary_key: Option<DataKey>,
    scale: f64,
    channel: u8,
    primary_offset: Option<usize>,
    secondary_offset: Option<usize>,
    value_type: Option<PdoDataType>,
}

impl SensorDescriptor {
    /// Resolve PDO offsets for `kind` against `slave`'s mappings. Missing
    /// mappings are not an error here — they surface as a per-cycle
    /// debug log from [`read_sensor_into_store`] instead (§4.8).
    #[must_use]
    pub fn resolve(
        name: impl Into<String>,
        kind: SensorKind,
        primary_key: DataKey,
        secondary_key: Option<DataKey>,
        scale: f64,
        channel: u8,
        slave: &SlaveConfig,
    ) -> Self {
        let names = field_names(kind);
        let primary = find_mapping(slave, names[0]);
        let secondary = names.get(1).and_then(|n| find_mapping(slave, n));

        let value_type = primary.and_then(|m| PdoDataType::parse(&m.data_type));

        Self {
            name: name.into(),
            kind,
            primary_key,
            secondary_key,
            scale,
            channel,
            primary_offset: primary.map(|m| m.byte_offset),
            secondary_offset: secondary.map(|m| m.byte_offset),
            value_type,
        }
    }

    /// This descriptor's diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Decode every registered descriptor into the Data Store. Returns the
/// number of successful decodes (§4.8: "every successful read increments
/// `read_success_count`"). A no-op when `master_active` is `false`.
pub fn read_sensor_stage(
    descriptors: &[SensorDescriptor],
    domain: &[u8],
    store: &DataStore,
    master_active: bool,
) -> u64 {
    if !master_active {
        return 0;
    }
    let mut success = 0u64;
    for desc in descriptors {
        if read_one(desc, domain, store) {
            success += 1;
        }
    }
    success
}

fn read_one(desc: &SensorDescriptor, domain: &[u8], store: &DataStore) -> bool {
    let Some(primary_offset) = desc.primary_offset else {
        debug!(sensor = desc.name(), "PDO mapping not found for sensor");
        return false;
    };

    match desc.kind {
        SensorKind::Position => {
            let (Some(pos_raw), Some(vel_offset)) = (
                pdo::read_i32(domain, primary_offset),
                desc.secondary_offset,
            ) else {
                debug!(sensor = desc.name(), "position PDO fields incomplete");
                return false;
            };
            let Some(vel_raw) = pdo::read_i32(domain, vel_offset) else {
                return false;
            };
            let position = pos_raw as f64 * desc.scale;
            let velocity = vel_raw as f64 * desc.scale;
            let mut ok = store.set_f64(desc.primary_key.as_index(), position).is_ok();
            if let Some(secondary) = desc.secondary_key {
                ok &= store.set_f64(secondary.as_index(), velocity).is_ok();
            }
            ok
        }
        SensorKind::Velocity | SensorKind::Torque => {
            let Some(ty) = desc.value_type else {
                return false;
            };
            let Some(value) = pdo::read_as_f64(domain, primary_offset, ty) else {
                return false;
            };
            store.set_f64(desc.primary_key.as_index(), value).is_ok()
        }
        SensorKind::Di => {
            let Some(bit) = pdo::read_bit(domain, primary_offset, desc.channel) else {
                return false;
            };
            store
                .set_i32(desc.primary_key.as_index(), i32::from(bit))
                .is_ok()
        }
        SensorKind::Ai => {
            let Some(ty) = desc.value_type else {
                return false;
            };
            let Some(value) = pdo::read_as_f64(domain, primary_offset, ty) else {
                return false;
            };
            store.set_f64(desc.primary_key.as_index(), value).is_ok()
        }
    }
}
