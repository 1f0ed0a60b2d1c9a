//! Measurement mode state machine.
//!
//! ```text
//!          start_periodic             stop_periodic
//!   IDLE ─────────────────▶ PERIODIC ───────────────▶ IDLE
//!     │
//!     │ arm_single_shot            read (sample consumed)
//!     └──────────────────▶ SINGLE_SHOT ──────────────────▶ IDLE
//! ```
//!
//! Transitions only happen on explicit calls; nothing times out.  The
//! device answers configuration commands with a NACK outside idle, so the
//! controller rejects them up front with [`SensorError::ModeConflict`]
//! instead of putting the request on the bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use super::scd4x::Scd4x;
use super::{MeasurementSample, SensorMode};
use crate::error::SensorError;

pub struct ModeController<I2C, D> {
    driver: Scd4x<I2C, D>,
}

impl<I2C: I2c, D: DelayNs> ModeController<I2C, D> {
    pub fn new(driver: Scd4x<I2C, D>) -> Self {
        Self { driver }
    }

    pub fn mode(&self) -> SensorMode {
        self.driver.mode()
    }

    /// Wait (ms) before a sample can be read in the current mode.
    pub fn cycle_time(&self) -> u32 {
        self.driver.conversion_cycle_time()
    }

    /// Block on the sensor's delay for `ms`.
    pub fn wait_ms(&mut self, ms: u32) {
        self.driver.wait_ms(ms);
    }

    pub fn driver_mut(&mut self) -> &mut Scd4x<I2C, D> {
        &mut self.driver
    }

    // ── Transitions ──────────────────────────────────────────

    pub fn start_periodic(&mut self) -> Result<(), SensorError> {
        self.require(SensorMode::Idle)?;
        self.driver.set_measurement(true, false, false)?;
        info!("Sensor: Idle -> PeriodicRunning");
        Ok(())
    }

    pub fn stop_periodic(&mut self) -> Result<(), SensorError> {
        self.require(SensorMode::PeriodicRunning)?;
        self.driver.set_measurement(false, false, false)?;
        info!("Sensor: PeriodicRunning -> Idle");
        Ok(())
    }

    pub fn arm_single_shot(&mut self, rht_only: bool) -> Result<(), SensorError> {
        self.require(SensorMode::Idle)?;
        self.driver.set_measurement(false, true, rht_only)
    }

    /// Read one sample.  A consumed single shot returns the machine to Idle.
    pub fn read(&mut self) -> Result<MeasurementSample, SensorError> {
        if self.mode() == SensorMode::Idle {
            return Err(SensorError::ModeConflict(SensorMode::Idle));
        }
        self.driver.get_measurement()
    }

    pub fn is_data_ready(&mut self) -> Result<bool, SensorError> {
        self.driver.is_data_ready()
    }

    /// Stop whatever is running and return to Idle, even if the stop
    /// command itself fails.
    pub fn abort(&mut self) {
        if let Err(e) = self.driver.set_measurement(false, false, false) {
            warn!("Sensor: stop during abort failed ({}), forcing Idle", e);
            self.driver.reset_mode();
        }
    }

    // ── Configuration (Idle only) ────────────────────────────

    pub fn altitude(&mut self) -> Result<u16, SensorError> {
        self.require(SensorMode::Idle)?;
        self.driver.altitude()
    }

    pub fn set_altitude(&mut self, masl: u16) -> Result<(), SensorError> {
        self.require(SensorMode::Idle)?;
        self.driver.set_altitude(masl)
    }

    pub fn temperature_offset(&mut self) -> Result<f32, SensorError> {
        self.require(SensorMode::Idle)?;
        self.driver.temperature_offset()
    }

    pub fn set_temperature_offset(&mut self, offset_c: f32) -> Result<(), SensorError> {
        self.require(SensorMode::Idle)?;
        self.driver.set_temperature_offset(offset_c)
    }

    fn require(&self, expected: SensorMode) -> Result<(), SensorError> {
        let mode = self.mode();
        if mode == expected {
            Ok(())
        } else {
            Err(SensorError::ModeConflict(mode))
        }
    }
}
