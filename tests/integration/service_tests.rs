//! Integration tests for the TelemetryService → sensor → broker pipeline.
//!
//! Bring-up and publish cycles run end to end against the simulated SCD4x,
//! radio and broker, on virtual time.

use co2node::adapters::log_sink::LogEventSink;
use co2node::adapters::mqtt::MqttAdapter;
use co2node::adapters::nvs::NvsAdapter;
use co2node::adapters::sim_scd4x::SimScd4x;
use co2node::adapters::time::ClockAdapter;
use co2node::adapters::wifi::WifiAdapter;
use co2node::app::events::AppEvent;
use co2node::app::ports::{ConfigPort, EventSink};
use co2node::app::service::{CycleOutcome, TelemetryService};
use co2node::config::NodeConfig;
use co2node::error::{SensorError, TransportError};
use co2node::network::NetworkSession;
use co2node::network::link::LinkStatusCode;
use co2node::sensor::{ModeController, Scd4x};
use co2node::telemetry::WireLayout;
use serde_json::Value;

use super::mock_hw::{EventLog, FixedClock, FlakyBus, RecordingDisplay};

type Service<S> = TelemetryService<
    FlakyBus,
    ClockAdapter,
    WifiAdapter,
    MqttAdapter,
    ClockAdapter,
    RecordingDisplay,
    FixedClock,
    S,
>;

struct Node<S> {
    service: Service<S>,
    dev: SimScd4x,
    bus: FlakyBus,
    wifi: WifiAdapter,
    mqtt: MqttAdapter,
    clock: ClockAdapter,
}

fn provisioned() -> NodeConfig {
    let mut c = NodeConfig::default();
    c.wifi.ssid = heapless::String::try_from("lab-2g").unwrap();
    c.wifi.password = heapless::String::try_from("password1").unwrap();
    c.sensor.warmup_samples = 1;
    c
}

fn node<S: EventSink>(config: NodeConfig, sink: S) -> Node<S> {
    let clock = ClockAdapter::new();
    let dev = SimScd4x::new(clock.clone());
    let bus = FlakyBus::new(dev.clone());
    let wifi = WifiAdapter::new();
    let mqtt = MqttAdapter::new();
    let sensor = ModeController::new(Scd4x::new(bus.clone(), clock.clone()));
    let network = NetworkSession::new(wifi.clone(), mqtt.clone(), clock.clone());
    let service = TelemetryService::new(
        config,
        sensor,
        network,
        RecordingDisplay::default(),
        FixedClock::default(),
        sink,
    );
    Node { service, dev, bus, wifi, mqtt, clock }
}

fn payload_json(mqtt: &MqttAdapter, index: usize) -> Value {
    let published = mqtt.published();
    serde_json::from_slice(&published[index].1).unwrap()
}

// ── Publish cycles ────────────────────────────────────────────

#[test]
fn consecutive_cycles_publish_fresh_readings() {
    let mut n = node(provisioned(), EventLog::default());
    n.service.bring_up().unwrap();
    n.dev.set_environment(700, 21.04, 38.6);

    for _ in 0..3 {
        assert_eq!(n.service.run_cycle(), CycleOutcome::Published);
    }
    assert_eq!(n.mqtt.published().len(), 3);

    let json = payload_json(&n.mqtt, 2);
    assert_eq!(json["CO2"], 700);
    assert_eq!(json["Date/Time"], "10-03-2024 06:01:01");
    assert_eq!(json["Temperature"], "21.0");
    assert_eq!(json["Humidity"], "39");
    assert_eq!(json["PublishIP"], "192.168.4.23");
    assert_eq!(json["PublishMac"], "28:cd:c1:0a:b3:ff");
    assert_eq!(n.service.cycles(), 3);
}

#[test]
fn cycle_takes_at_least_one_single_shot_period() {
    let mut n = node(provisioned(), EventLog::default());
    n.service.bring_up().unwrap();
    let before = n.clock.now_ms();
    n.service.run_cycle();
    assert!(n.clock.now_ms() - before >= 15_000);
}

/// Longest settings `validate` accepts for conversion, holds and join.
fn slowest_valid() -> NodeConfig {
    let mut c = provisioned();
    c.sensor.base_cycle_ms = 60_000;
    c.display.hold_ms = 10_000;
    c.wifi.connect_timeout_secs = 120;
    c.sensor.warmup_samples = 0;
    c.validate().unwrap();
    c
}

#[test]
fn failed_recovery_finishes_inside_watchdog_window() {
    let config = slowest_valid();
    let watchdog_ms = u64::from(config.watchdog_timeout_ms());
    let worst_ms = u64::from(config.worst_case_cycle_ms());
    let mut n = node(config, EventLog::default());
    n.service.bring_up().unwrap();

    n.mqtt.fail_publishes(1, TransportError::Io);
    n.wifi.script_join(&[LinkStatusCode::Joining]);
    let before = n.clock.now_ms();
    assert_eq!(n.service.run_cycle(), CycleOutcome::Dropped);
    let elapsed = n.clock.now_ms() - before;

    // 180 s shot, four 10 s holds, 120 s join that never settles.
    assert!(elapsed >= 340_000);
    assert!(elapsed <= worst_ms);
    assert!(elapsed < watchdog_ms);
}

#[test]
fn successful_recovery_finishes_inside_watchdog_window() {
    let config = slowest_valid();
    let watchdog_ms = u64::from(config.watchdog_timeout_ms());
    let worst_ms = u64::from(config.worst_case_cycle_ms());
    let mut n = node(config, EventLog::default());
    n.service.bring_up().unwrap();

    n.mqtt.fail_publishes(1, TransportError::Io);
    let before = n.clock.now_ms();
    assert_eq!(n.service.run_cycle(), CycleOutcome::Recovered);
    let elapsed = n.clock.now_ms() - before;

    assert!(elapsed >= 180_000 + 5 * 10_000);
    assert!(elapsed <= worst_ms);
    assert!(elapsed < watchdog_ms);
}

#[test]
fn pair_list_layout_publishes_sorted_pairs() {
    let mut config = provisioned();
    config.wire_layout = WireLayout::PairList;
    let mut n = node(config, EventLog::default());
    n.service.bring_up().unwrap();
    n.service.run_cycle();

    let json = payload_json(&n.mqtt, 0);
    let keys: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| pair[0].as_str().unwrap())
        .collect();
    assert_eq!(
        keys,
        ["CO2", "Date/Time", "Humidity", "PublishIP", "PublishMac", "Temperature"]
    );
}

#[test]
fn corrupted_word_drops_only_that_cycle() {
    let mut n = node(provisioned(), EventLog::default());
    n.service.bring_up().unwrap();

    n.bus.corrupt_next_read();
    assert_eq!(
        n.service.run_cycle(),
        CycleOutcome::SensorFault(SensorError::Crc)
    );
    assert!(n.mqtt.published().is_empty());
    assert_eq!(
        n.service
            .sink()
            .count(|e| matches!(e, AppEvent::SensorFault(SensorError::Crc))),
        1
    );

    assert_eq!(n.service.run_cycle(), CycleOutcome::Published);
}

#[test]
fn display_ends_each_cycle_on_the_reading() {
    let mut n = node(provisioned(), EventLog::default());
    n.service.bring_up().unwrap();
    n.dev.set_environment(1234, 19.96, 71.4);
    n.service.run_cycle();
    let last = n.service.display().last().unwrap();
    assert_eq!(last.0, "CO2: 1234PPM");
    assert_eq!(last.1, "T=20.0°C, RH=71%");
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn persisted_config_drives_bring_up() {
    let nvs = NvsAdapter::new().unwrap();
    let mut stored = provisioned();
    stored.sensor.altitude_m = 250;
    stored.broker.topic = heapless::String::try_from("site/b/co2").unwrap();
    nvs.save(&stored).unwrap();

    let mut n = node(nvs.load().unwrap(), EventLog::default());
    n.service.bring_up().unwrap();
    assert!(n.service.display().shows("M.A.S.L. : 250m.", ""));

    n.service.run_cycle();
    assert_eq!(n.mqtt.published()[0].0, "site/b/co2");
}

#[test]
fn runs_with_the_log_sink() {
    let mut n = node(provisioned(), LogEventSink::new());
    n.service.bring_up().unwrap();
    assert_eq!(n.service.run_cycle(), CycleOutcome::Published);
}
