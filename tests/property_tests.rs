//! Property and fuzz-style tests for robustness of core data structures.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use std::net::Ipv4Addr;

use chrono::NaiveDate;
use co2node::adapters::sim_scd4x::SimScd4x;
use co2node::adapters::time::ClockAdapter;
use co2node::error::SensorError;
use co2node::network::link::{IpConfig, LinkIdentity, LinkStatusCode};
use co2node::sensor::scd4x::{decode_words, encode_word};
use co2node::sensor::{MeasurementSample, ModeController, Scd4x, SensorMode};
use co2node::telemetry::{TelemetryMessage, WireLayout};
use proptest::prelude::*;
use serde_json::Value;

// ── Word framing ──────────────────────────────────────────────

proptest! {
    /// Arbitrary bytes never panic the decoder; errors are always typed.
    #[test]
    fn decode_never_panics(
        buf in proptest::collection::vec(any::<u8>(), 0..=32),
        words in 0usize..=8,
    ) {
        let mut out = vec![0u16; words];
        match decode_words(&buf, &mut out) {
            Ok(()) => prop_assert_eq!(buf.len(), words * 3),
            Err(e) => prop_assert_eq!(e, SensorError::Crc),
        }
    }

    /// Any single flipped bit in a framed word is caught.
    #[test]
    fn single_bit_errors_are_detected(word in any::<u16>(), bit in 0usize..24) {
        let mut framed = encode_word(word);
        framed[bit / 8] ^= 1 << (bit % 8);
        let mut out = [0u16; 1];
        prop_assert_eq!(decode_words(&framed, &mut out), Err(SensorError::Crc));
    }
}

// ── Mode state machine ────────────────────────────────────────

#[derive(Debug, Clone)]
enum ModeOp {
    StartPeriodic,
    StopPeriodic,
    ArmSingleShot(bool),
    Wait(u32),
    Read,
    SetAltitude(u16),
    Abort,
}

fn arb_mode_op() -> impl Strategy<Value = ModeOp> {
    prop_oneof![
        Just(ModeOp::StartPeriodic),
        Just(ModeOp::StopPeriodic),
        any::<bool>().prop_map(ModeOp::ArmSingleShot),
        (0u32..=16_000).prop_map(ModeOp::Wait),
        Just(ModeOp::Read),
        (0u16..=3_000).prop_map(ModeOp::SetAltitude),
        Just(ModeOp::Abort),
    ]
}

proptest! {
    /// Configuration only ever succeeds from Idle, and the controller never
    /// believes the device idle while it is still measuring.
    #[test]
    fn configuration_is_gated_to_idle(
        ops in proptest::collection::vec(arb_mode_op(), 1..=24),
    ) {
        let clock = ClockAdapter::new();
        let dev = SimScd4x::new(clock.clone());
        let mut ctrl = ModeController::new(Scd4x::new(dev.clone(), clock));

        for op in &ops {
            let before = ctrl.mode();
            match op {
                ModeOp::StartPeriodic => { let _ = ctrl.start_periodic(); }
                ModeOp::StopPeriodic => { let _ = ctrl.stop_periodic(); }
                ModeOp::ArmSingleShot(rht) => { let _ = ctrl.arm_single_shot(*rht); }
                ModeOp::Wait(ms) => ctrl.wait_ms(*ms),
                ModeOp::Read => { let _ = ctrl.read(); }
                ModeOp::SetAltitude(m) => {
                    let result = ctrl.set_altitude(*m);
                    if before == SensorMode::Idle {
                        prop_assert!(result.is_ok());
                    } else {
                        prop_assert_eq!(result, Err(SensorError::ModeConflict(before)));
                    }
                }
                ModeOp::Abort => ctrl.abort(),
            }
            match ctrl.mode() {
                SensorMode::Idle => prop_assert!(!dev.is_measuring()),
                SensorMode::PeriodicRunning => prop_assert!(dev.is_measuring()),
                SensorMode::SingleShotPending => {}
            }
        }

        // Abort always returns to a usable Idle.
        ctrl.abort();
        prop_assert_eq!(ctrl.mode(), SensorMode::Idle);
        prop_assert!(ctrl.altitude().is_ok());
    }
}

// ── Telemetry wire format ─────────────────────────────────────

proptest! {
    /// Both layouts carry the same six fields, keys in sorted order.
    #[test]
    fn wire_keys_are_sorted_in_both_layouts(
        co2 in any::<u16>(),
        t in -45.0f32..130.0,
        rh in 0.0f32..=100.0,
        ip in any::<[u8; 4]>(),
        mac in any::<[u8; 6]>(),
        secs in 0u32..86_400,
    ) {
        let sample = MeasurementSample { co2_ppm: co2, temperature_c: t, relative_humidity: rh };
        let identity = LinkIdentity { ip: Ipv4Addr::from(ip), mac };
        let ts = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(secs / 3600, (secs / 60) % 60, secs % 60)
            .unwrap();
        let msg = TelemetryMessage::new(&sample, &identity, ts);
        let expected = ["CO2", "Date/Time", "Humidity", "PublishIP", "PublishMac", "Temperature"];

        let text = String::from_utf8(msg.encode(WireLayout::Object).unwrap()).unwrap();
        let mut last = 0;
        for key in expected {
            let at = text.find(&format!("\"{}\":", key));
            prop_assert!(at.is_some_and(|i| i >= last), "key {} out of order in {}", key, text);
            last = at.unwrap_or(0);
        }

        let pairs: Value = serde_json::from_slice(&msg.encode(WireLayout::PairList).unwrap()).unwrap();
        let keys: Vec<&str> = pairs
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|p| p[0].as_str())
            .collect();
        prop_assert_eq!(keys, expected.to_vec());
    }
}

// ── Link status and addressing ────────────────────────────────

proptest! {
    #[test]
    fn status_codes_round_trip_or_reject(code in any::<i8>()) {
        match LinkStatusCode::from_code(code) {
            Some(status) => prop_assert_eq!(status.code(), code),
            None => prop_assert!(!(-3..=3).contains(&code)),
        }
    }

    /// A contiguous netmask always yields its prefix length.
    #[test]
    fn contiguous_netmask_has_prefix(prefix in 0u8..=32) {
        let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
        let cfg = IpConfig::new([10, 0, 0, 2], mask.to_be_bytes(), [10, 0, 0, 1], [10, 0, 0, 1]);
        prop_assert_eq!(cfg.prefix_len(), Some(prefix));
    }
}
