//! Clock adapter: blocking delays plus local wall-clock time.
//!
//! Implements `embedded_hal::delay::DelayNs` for every blocking wait in the
//! firmware and [`WallClock`] for telemetry timestamps.
//!
//! - **`target_os = "espidf"`** — delays go through the ESP-IDF hybrid
//!   FreeRTOS/ROM delay; wall time is the SNTP-synced system clock shifted
//!   by the configured UTC offset.
//! - **`not(target_os = "espidf")`** — a virtual clock.  Delays advance a
//!   shared counter instead of sleeping, so host tests can run the
//!   15-second single-shot settle in microseconds.  Clones share the same
//!   timeline, which lets a simulated device observe the delays the driver
//!   takes.

use chrono::{NaiveDateTime, TimeDelta};
use embedded_hal::delay::DelayNs;

use crate::app::ports::WallClock;

#[cfg(not(target_os = "espidf"))]
use std::{cell::Cell, rc::Rc};

#[derive(Clone)]
pub struct ClockAdapter {
    utc_offset: TimeDelta,
    #[cfg(target_os = "espidf")]
    delay: esp_idf_hal::delay::Delay,
    #[cfg(not(target_os = "espidf"))]
    now_ns: Rc<Cell<u64>>,
    #[cfg(not(target_os = "espidf"))]
    epoch: NaiveDateTime,
}

impl Default for ClockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockAdapter {
    pub fn new() -> Self {
        Self {
            utc_offset: TimeDelta::zero(),
            #[cfg(target_os = "espidf")]
            delay: esp_idf_hal::delay::Delay::new_default(),
            #[cfg(not(target_os = "espidf"))]
            now_ns: Rc::new(Cell::new(0)),
            #[cfg(not(target_os = "espidf"))]
            epoch: NaiveDateTime::default(),
        }
    }

    /// Shift wall-clock readings by `minutes` east of UTC.
    pub fn with_utc_offset_minutes(mut self, minutes: i16) -> Self {
        self.utc_offset = TimeDelta::minutes(i64::from(minutes));
        self
    }

    /// Simulation: UTC wall time at virtual instant zero.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_epoch(mut self, epoch: NaiveDateTime) -> Self {
        self.epoch = epoch;
        self
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds of virtual time elapsed.
    #[cfg(not(target_os = "espidf"))]
    pub fn now_ms(&self) -> u64 {
        self.now_ns.get() / 1_000_000
    }
}

impl DelayNs for ClockAdapter {
    #[cfg(target_os = "espidf")]
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_us(ns.div_ceil(1_000));
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns.set(self.now_ns.get() + u64::from(ns));
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ms(&mut self, ms: u32) {
        self.now_ns.set(self.now_ns.get() + u64::from(ms) * 1_000_000);
    }
}

impl WallClock for ClockAdapter {
    #[cfg(target_os = "espidf")]
    fn now(&self) -> NaiveDateTime {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        chrono::DateTime::from_timestamp(secs, 0)
            .map(|utc| utc.naive_utc())
            .unwrap_or_default()
            + self.utc_offset
    }

    #[cfg(not(target_os = "espidf"))]
    fn now(&self) -> NaiveDateTime {
        let elapsed = TimeDelta::milliseconds(self.now_ms() as i64);
        self.epoch + elapsed + self.utc_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn clones_share_one_timeline() {
        let a = ClockAdapter::new();
        let mut b = a.clone();
        b.delay_ms(1_500);
        b.delay_us(500);
        assert_eq!(a.now_ms(), 1_500);
        b.delay_us(500);
        assert_eq!(a.now_ms(), 1_501);
    }

    #[test]
    fn wall_clock_applies_offset() {
        let epoch = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        let mut clock = ClockAdapter::new()
            .with_epoch(epoch)
            .with_utc_offset_minutes(7 * 60);
        clock.delay_ms(61_000);
        let expected = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(6, 1, 1)
            .unwrap();
        assert_eq!(clock.now(), expected);
    }
}
