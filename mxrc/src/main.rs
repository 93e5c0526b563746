//! # mxrc — RT process binary
//!
//! Loads the EtherCAT master/slave configuration, maps the shared memory
//! region, wires the EtherCAT Cycle Driver into the RT Executive, and runs
//! the cyclic loop until a shutdown signal arrives. The CLI shape and
//! startup sequence follow `evo_hal`'s binary (config path flag, signal
//! handler installed before the RT loop starts, `init` → `run` →
//! `shutdown`); the cyclic loop body itself is `RtExecutive::tick`.

use clap::Parser;
use mxrc_common::config::{ConfigLoader, EtherCatConfig, SlaveConfig};
use mxrc_common::consts::SHM_REGION_NAME;
use mxrc_common::data_key::DataKey;
use mxrc_ethercat::actuator::{MotorDescriptor, OutputDescriptor};
use mxrc_ethercat::master::{EtherCatMaster, SimulationMaster};
use mxrc_ethercat::sensor::{SensorDescriptor, SensorKind};
use mxrc_ethercat::{CycleDriverAction, EtherCatCycleDriver};
use mxrc_executive::{NullEventSink, RtEvent, RtExecutive, RtState};
use mxrc_store::SharedMemoryRegion;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// `mxrc` — RT-process binary driving an EtherCAT bus on a fixed cyclic
/// schedule.
#[derive(Parser, Debug)]
#[command(name = "mxrc")]
#[command(version)]
#[command(about = "Real-time EtherCAT motion-control Executive")]
struct Args {
    /// Path to the EtherCAT master/slave configuration file (YAML).
    #[arg(short, long, default_value = "/etc/mxrc/config")]
    config: PathBuf,

    /// Apply PREEMPT_RT scheduling: SCHED_FIFO priority, CPU pinning, and
    /// locked memory. Off by default so the binary also runs unprivileged
    /// on a development machine.
    #[arg(long)]
    rt: bool,

    /// Enable verbose (DEBUG) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("mxrc startup failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("mxrc RT process v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = EtherCatConfig::load(&args.config)?;
    config.validate()?;
    info!(slaves = config.slaves.len(), "configuration loaded");

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("received shutdown signal");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let region = SharedMemoryRegion::create(SHM_REGION_NAME)?;
    info!(region = region.name(), "shared memory region created");

    let minor_cycle_us = config.master.cycle_time_ns / 1_000;
    let mut executive = RtExecutive::new(
        minor_cycle_us,
        1,
        config.master.priority,
        config.master.cpu_affinity,
    );

    let driver = build_cycle_driver(&config)?;
    executive
        .register_action(Box::new(CycleDriverAction::new(driver, minor_cycle_us)))
        .map_err(|e| format!("failed to register the EtherCAT cycle driver: {e}"))?;

    if args.rt {
        executive.rt_setup()?;
    }

    let mut sink = NullEventSink;
    executive.request(RtEvent::Start, &mut sink);
    executive.request(RtEvent::Start, &mut sink);

    sd_notify::notify(false, &[sd_notify::NotifyState::Ready])?;
    info!("mxrc RT process ready, entering cyclic loop");

    while running.load(Ordering::SeqCst) && executive.state() != RtState::Shutdown {
        executive.tick(region.shared_data(), &mut sink)?;
    }
    if executive.state() != RtState::Shutdown {
        info!("shutdown requested, draining to SHUTDOWN");
        executive.request(RtEvent::Stop, &mut sink);
        executive.tick(region.shared_data(), &mut sink)?;
    }

    info!(
        ticks = executive.stats().tick_count(),
        deadline_misses = executive.stats().deadline_misses(),
        "mxrc RT process shutdown complete"
    );
    Ok(())
}

/// Build the Cycle Driver and register one action per configured slave,
/// keyed by `device_type` against the Data Store's axis-0/axis-1 key
/// bands (§3: only two sensor/output channels and one motor slot are
/// modeled). A `device_type` this binary does not recognize is logged and
/// skipped rather than rejected — slave configuration is a collaborator
/// concern, not the CORE's.
fn build_cycle_driver(config: &EtherCatConfig) -> Result<EtherCatCycleDriver, Box<dyn std::error::Error>> {
    let domain_len = estimate_domain_len(config);
    let mut master = SimulationMaster::new(domain_len);
    master.initialize()?;
    master.activate()?;
    let mut driver = EtherCatCycleDriver::new(Box::new(master));

    let mut motor_registered = false;
    for slave in &config.slaves {
        let axis = (slave.position % 2) as u8;
        match slave.device_type.as_str() {
            "bldc_drive" if !motor_registered => {
                driver.register_motor(MotorDescriptor::bldc(
                    slave.device_name.clone(),
                    DataKey::Motor0Mode,
                    DataKey::Motor0Enable,
                    DataKey::Motor0Velocity,
                    DataKey::Motor0Torque,
                    slave,
                ));
                register_axis_sensor(&mut driver, slave, axis);
                motor_registered = true;
            }
            "servo_drive" if !motor_registered => {
                driver.register_motor(MotorDescriptor::servo(
                    slave.device_name.clone(),
                    DataKey::Motor0Mode,
                    DataKey::Motor0Enable,
                    DataKey::Motor0Position,
                    DataKey::Motor0Velocity,
                    DataKey::Motor0Torque,
                    3_000.0,
                    100.0,
                    slave,
                ));
                register_axis_sensor(&mut driver, slave, axis);
                motor_registered = true;
            }
            "io_module" => {
                driver.register_output(OutputDescriptor::digital(
                    format!("{}_do", slave.device_name),
                    digital_output_key(axis),
                    0,
                    slave,
                ));
                driver.register_output(OutputDescriptor::analog(
                    format!("{}_ao", slave.device_name),
                    analog_output_key(axis),
                    0.0,
                    10.0,
                    slave,
                ));
            }
            "bldc_drive" | "servo_drive" => {
                warn!(
                    slave = slave.device_name.as_str(),
                    "motor slot already taken, skipping additional drive"
                );
            }
            other => {
                warn!(
                    slave = slave.device_name.as_str(),
                    device_type = other,
                    "unrecognized device_type, no sensor/actuator registered"
                );
            }
        }
    }
    Ok(driver)
}

fn register_axis_sensor(driver: &mut EtherCatCycleDriver, slave: &SlaveConfig, axis: u8) {
    let (position_key, velocity_key) = sensor_keys(axis);
    driver.register_sensor(SensorDescriptor::resolve(
        format!("{}_position", slave.device_name),
        SensorKind::Position,
        position_key,
        Some(velocity_key),
        1.0,
        0,
        slave,
    ));
}

fn sensor_keys(axis: u8) -> (DataKey, DataKey) {
    match axis {
        0 => (DataKey::SensorPosition0, DataKey::SensorVelocity0),
        _ => (DataKey::SensorPosition1, DataKey::SensorVelocity1),
    }
}

fn digital_output_key(axis: u8) -> DataKey {
    match axis {
        0 => DataKey::DigitalOutput0,
        _ => DataKey::DigitalOutput1,
    }
}

fn analog_output_key(axis: u8) -> DataKey {
    match axis {
        0 => DataKey::AnalogOutput0,
        _ => DataKey::AnalogOutput1,
    }
}

/// A domain buffer large enough to hold every configured PDO field, with a
/// floor for slave-less test configurations.
fn estimate_domain_len(config: &EtherCatConfig) -> usize {
    config
        .slaves
        .iter()
        .flat_map(|s| s.pdo_mappings.iter())
        .map(|m| m.byte_offset + 8)
        .max()
        .unwrap_or(64)
        .max(64)
}

/// Configure the `tracing` subscriber from the CLI flags.
fn setup_tracing(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
