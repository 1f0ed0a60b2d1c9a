//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements             | Connects to                  |
//! |--------------|------------------------|------------------------------|
//! | `lcd`        | DisplayPort            | HD44780 via PCF8574 (I2C)    |
//! | `log_sink`   | EventSink              | Serial log output            |
//! | `mqtt`       | MessagingPort          | ESP-IDF MQTT client          |
//! | `nvs`        | ConfigPort             | NVS / in-memory store        |
//! | `time`       | DelayNs, WallClock     | FreeRTOS delay, system clock |
//! | `wifi`       | WirelessPort           | ESP-IDF WiFi STA             |
//! | `sim_scd4x`  | embedded-hal I2c       | Simulated SCD4x (host only)  |

pub mod lcd;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
#[cfg(not(target_os = "espidf"))]
pub mod sim_scd4x;
pub mod time;
pub(crate) mod utils;
pub mod wifi;
