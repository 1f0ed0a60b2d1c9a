//! GPIO / peripheral pin assignments for the co2node board.
//!
//! Single source of truth; `main` references this module rather than
//! hard-coding pin numbers.  The sensor and the display sit on separate
//! I²C controllers.

// ---------------------------------------------------------------------------
// I²C bus 0: SCD4x CO2 sensor
// ---------------------------------------------------------------------------

pub const SENSOR_I2C_SDA_GPIO: i32 = 14;
pub const SENSOR_I2C_SCL_GPIO: i32 = 15;

// ---------------------------------------------------------------------------
// I²C bus 1: 16x2 LCD (PCF8574 backpack)
// ---------------------------------------------------------------------------

pub const LCD_I2C_SDA_GPIO: i32 = 12;
pub const LCD_I2C_SCL_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// Bus configuration
// ---------------------------------------------------------------------------

/// Both devices are rated for fast mode; standard mode keeps long
/// breadboard wiring happy.
pub const I2C_BAUDRATE_HZ: u32 = 100_000;
