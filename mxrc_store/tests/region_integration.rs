//! Integration tests exercising `SharedMemoryRegion` the way RT and Non-RT
//! processes actually use it: one side creates, the other opens by name,
//! and they exchange data purely through the mapped region.

use mxrc_store::{SharedMemoryRegion, ShmError};
use std::sync::atomic::Ordering;

fn unique_name(tag: &str) -> String {
    format!("/mxrc_test_integ_{tag}_{}", std::process::id())
}

#[test]
fn two_independent_mappings_observe_the_same_writes() {
    let name = unique_name("crossproc");
    let _ = SharedMemoryRegion::unlink(&name);

    let rt_side = SharedMemoryRegion::create(&name).expect("rt creates region");
    let nonrt_side = SharedMemoryRegion::open(&name).expect("nonrt opens region");

    nonrt_side
        .shared_data()
        .nonrt_heartbeat_ns
        .store(123_456_789, Ordering::Release);

    let seen = rt_side.shared_data().nonrt_heartbeat_ns.load(Ordering::Acquire);
    assert_eq!(seen, 123_456_789);

    rt_side
        .shared_data()
        .rt_state_code
        .store(2, Ordering::Release);
    assert_eq!(
        nonrt_side.shared_data().rt_state_code.load(Ordering::Acquire),
        2
    );

    drop(nonrt_side);
    drop(rt_side);
    let _ = SharedMemoryRegion::unlink(&name);
}

#[test]
fn data_store_entries_round_trip_across_mappings() {
    let name = unique_name("store");
    let _ = SharedMemoryRegion::unlink(&name);

    let writer = SharedMemoryRegion::create(&name).unwrap();
    writer.shared_data().data.set_f64(100, 12.5).unwrap();
    writer.shared_data().data.set_i32(200, 1).unwrap();

    let reader = SharedMemoryRegion::open(&name).unwrap();
    let mut position = 0f64;
    reader.shared_data().data.get_f64(100, &mut position).unwrap();
    assert_eq!(position, 12.5);

    let mut mode = 0i32;
    reader.shared_data().data.get_i32(200, &mut mode).unwrap();
    assert_eq!(mode, 1);

    let _ = SharedMemoryRegion::unlink(&name);
}

#[test]
fn unlink_by_rt_process_does_not_disturb_an_already_open_mapping() {
    let name = unique_name("unlink_live");
    let _ = SharedMemoryRegion::unlink(&name);

    let rt_side = SharedMemoryRegion::create(&name).unwrap();
    let nonrt_side = SharedMemoryRegion::open(&name).unwrap();
    nonrt_side.shared_data().data.set_i32(0, 7).unwrap();

    // RT process shuts down: its Drop unlinks the name, but nonrt_side's
    // mapping stays valid until it, too, is dropped.
    drop(rt_side);

    let mut out = 0i32;
    nonrt_side.shared_data().data.get_i32(0, &mut out).unwrap();
    assert_eq!(out, 7);

    assert!(matches!(
        SharedMemoryRegion::open(&name),
        Err(ShmError::NotFound { .. })
    ));
}
