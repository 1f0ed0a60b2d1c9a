//! co2node firmware — main entry point.
//!
//! Hexagonal layout: the library holds the domain core, this binary only
//! wires ESP-IDF peripherals into adapters and hands them over.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Scd4x (I2C0)   Lcd1602 (I2C1)   WifiAdapter   MqttAdapter     │
//! │  NvsAdapter     ClockAdapter     LogEventSink                  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          TelemetryService (measure · publish)          │    │
//! │  │  ModeController · NetworkSession · TelemetryMessage    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::EspWifi;

use co2node::adapters::lcd::{self, Lcd1602};
use co2node::adapters::log_sink::LogEventSink;
use co2node::adapters::mqtt::MqttAdapter;
use co2node::adapters::nvs::NvsAdapter;
use co2node::adapters::time::ClockAdapter;
use co2node::adapters::wifi::WifiAdapter;
use co2node::app::ports::ConfigPort;
use co2node::app::service::TelemetryService;
use co2node::config::NodeConfig;
use co2node::drivers::watchdog::Watchdog;
use co2node::network::NetworkSession;
use co2node::pins;
use co2node::sensor::timing::CycleTiming;
use co2node::sensor::{ModeController, Scd4x};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  co2node v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsAdapter::new().and_then(|nvs| nvs.load()) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            NodeConfig::default()
        }
    };
    let config = match config.validate() {
        Ok(()) => config,
        Err(e) => {
            warn!("Stored config rejected ({}), using defaults", e);
            NodeConfig::default()
        }
    };

    let watchdog_ms = config.watchdog_timeout_ms();

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let i2c_config = I2cConfig::new().baudrate(Hertz(pins::I2C_BAUDRATE_HZ));

    // SAFETY: each GPIO number is claimed exactly once, here, and no
    // typed pin from `peripherals.pins` is taken for the same numbers.
    let (sensor_sda, sensor_scl, lcd_sda, lcd_scl) = unsafe {
        (
            AnyIOPin::new(pins::SENSOR_I2C_SDA_GPIO),
            AnyIOPin::new(pins::SENSOR_I2C_SCL_GPIO),
            AnyIOPin::new(pins::LCD_I2C_SDA_GPIO),
            AnyIOPin::new(pins::LCD_I2C_SCL_GPIO),
        )
    };
    let sensor_bus = I2cDriver::new(peripherals.i2c0, sensor_sda, sensor_scl, &i2c_config)?;
    let lcd_bus = I2cDriver::new(peripherals.i2c1, lcd_sda, lcd_scl, &i2c_config)?;

    // ── 4. Construct adapters ─────────────────────────────────
    let clock = ClockAdapter::new().with_utc_offset_minutes(config.utc_offset_minutes);

    let display = Lcd1602::new(lcd_bus, clock.clone(), lcd::DEFAULT_ADDRESS)
        .map_err(|e| anyhow::anyhow!("LCD init failed: {:?}", e))?;

    let timing = CycleTiming::new(config.sensor.base_cycle_ms);
    let sensor = ModeController::new(Scd4x::with_timing(sensor_bus, clock.clone(), timing));

    let wifi = WifiAdapter::new(EspWifi::new(peripherals.modem, sysloop, None)?);
    let network = NetworkSession::new(wifi, MqttAdapter::new(), clock.clone());

    // ── 5. Bring-up, then the publish loop ────────────────────
    let mut app = TelemetryService::new(
        config,
        sensor,
        network,
        display,
        clock,
        LogEventSink::new(),
    );
    let serial = app.bring_up()?;
    info!("System ready (sensor {:012x}). Entering publish loop.", serial);

    let watchdog = Watchdog::new(watchdog_ms);
    app.run(&watchdog)
}
