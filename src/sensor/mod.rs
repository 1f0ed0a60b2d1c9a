//! Sensor subsystem: SCD4x driver, mode controller and reading patterns.
//!
//! ```text
//!   reader (poll loop · lazy samples · single shot)
//!      │
//!      ▼
//!   ModeController ── gates configuration to Idle, derives cycle timing
//!      │
//!      ▼
//!   Scd4x ── command/word/CRC framing over embedded-hal I2C
//! ```

pub mod mode;
pub mod reader;
pub mod scd4x;
pub mod timing;

pub use mode::ModeController;
pub use scd4x::Scd4x;
pub use timing::CycleTiming;

/// Upper bound of the CO2 range the device reports meaningfully (ppm).
pub const CO2_MAX_PPM: u16 = 40_000;

/// One completed measurement.  Consumed immediately by display and publish.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementSample {
    pub co2_ppm: u16,
    pub temperature_c: f32,
    pub relative_humidity: f32,
}

impl MeasurementSample {
    /// Convert the three raw device words (CO2, T, RH) into engineering units.
    pub fn from_raw(co2: u16, temperature: u16, humidity: u16) -> Self {
        Self {
            co2_ppm: co2,
            temperature_c: -45.0 + 175.0 * f32::from(temperature) / 65535.0,
            relative_humidity: 100.0 * f32::from(humidity) / 65535.0,
        }
    }

    /// True when every field is inside the device's specified range.
    pub fn is_plausible(&self) -> bool {
        self.co2_ppm <= CO2_MAX_PPM && (0.0..=100.0).contains(&self.relative_humidity)
    }
}

/// Operating mode of the measurement device.  Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorMode {
    /// Accepts configuration commands.
    #[default]
    Idle,
    /// Re-measures every base cycle until stopped.
    PeriodicRunning,
    /// One measurement armed; returns to Idle once the sample is read.
    SingleShotPending,
}
