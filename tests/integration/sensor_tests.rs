//! Integration tests for the sensor mode controller and reading patterns.

use co2node::adapters::sim_scd4x::SimScd4x;
use co2node::adapters::time::ClockAdapter;
use co2node::error::SensorError;
use co2node::sensor::{ModeController, Scd4x, SensorMode, reader};

fn controller() -> (ModeController<SimScd4x, ClockAdapter>, SimScd4x) {
    let clock = ClockAdapter::new();
    let dev = SimScd4x::new(clock.clone());
    (ModeController::new(Scd4x::new(dev.clone(), clock)), dev)
}

#[test]
fn configuration_is_refused_while_periodic() {
    let (mut ctrl, _) = controller();
    let mut seen = 0;
    reader::poll_loop(&mut ctrl, 2, |_| seen += 1).unwrap();
    assert_eq!(seen, 2);

    assert_eq!(
        ctrl.set_altitude(100),
        Err(SensorError::ModeConflict(SensorMode::PeriodicRunning))
    );
    ctrl.stop_periodic().unwrap();
    ctrl.set_altitude(100).unwrap();
    assert_eq!(ctrl.altitude().unwrap(), 100);
}

#[test]
fn lazy_sequence_yields_in_device_order() {
    let (mut ctrl, dev) = controller();
    dev.set_co2_step(10);
    let readings: Vec<u16> = reader::samples(&mut ctrl)
        .unwrap()
        .filter_map(|r| r.unwrap())
        .take(3)
        .map(|s| s.co2_ppm)
        .collect();
    assert_eq!(readings, [400, 410, 420]);
    assert!(dev.is_measuring());
}

#[test]
fn rht_only_shot_settles_fast_and_skips_co2() {
    let (mut ctrl, _) = controller();
    ctrl.arm_single_shot(true).unwrap();
    assert_eq!(ctrl.cycle_time(), 150);
    let wait = ctrl.cycle_time();
    ctrl.wait_ms(wait);
    let sample = ctrl.read().unwrap();
    assert_eq!(sample.co2_ppm, 0);
    assert_eq!(ctrl.mode(), SensorMode::Idle);
}

#[test]
fn single_shot_from_periodic_is_a_mode_conflict() {
    let (mut ctrl, _) = controller();
    ctrl.start_periodic().unwrap();
    assert_eq!(
        reader::single_shot(&mut ctrl),
        Err(SensorError::ModeConflict(SensorMode::PeriodicRunning))
    );
    ctrl.abort();
    assert!(reader::single_shot(&mut ctrl).is_ok());
}
