//! Conversion-cycle timing contract.
//!
//! The device needs a full conversion cycle between arming and data-ready.
//! Single-shot reads wait three base cycles: the first single-shot after
//! leaving periodic mode carries a start-up transient that a one-cycle wait
//! picks up.

use super::SensorMode;

/// Default base conversion cycle (ms) for CO2 + T + RH.
pub const BASE_CYCLE_MS: u32 = 5_000;

/// Conversion cycle (ms) for a temperature/humidity-only single shot.
pub const RHT_ONLY_CYCLE_MS: u32 = 50;

/// Multiplier applied to the base cycle for single-shot measurements.
pub const SINGLE_SHOT_FACTOR: u32 = 3;

/// Minimum wait between arming a measurement and reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTiming {
    base_ms: u32,
}

impl Default for CycleTiming {
    fn default() -> Self {
        Self::new(BASE_CYCLE_MS)
    }
}

impl CycleTiming {
    pub const fn new(base_ms: u32) -> Self {
        Self { base_ms }
    }

    pub const fn base_ms(&self) -> u32 {
        self.base_ms
    }

    /// Wait (ms) appropriate to `mode`.
    pub fn for_mode(&self, mode: SensorMode, rht_only: bool) -> u32 {
        match mode {
            SensorMode::Idle | SensorMode::PeriodicRunning => self.base_ms,
            SensorMode::SingleShotPending if rht_only => RHT_ONLY_CYCLE_MS * SINGLE_SHOT_FACTOR,
            SensorMode::SingleShotPending => self.base_ms.saturating_mul(SINGLE_SHOT_FACTOR),
        }
    }
}
