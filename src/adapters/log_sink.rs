//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { serial } => {
                info!("START | sensor serial={:012x}", serial);
            }
            AppEvent::Sample(s) => {
                info!(
                    "SAMPLE | CO2={}ppm | T={:.1}\u{00b0}C | RH={:.0}%",
                    s.co2_ppm, s.temperature_c, s.relative_humidity
                );
            }
            AppEvent::ImplausibleSample(s) => {
                warn!(
                    "SAMPLE | implausible CO2={}ppm RH={:.0}%",
                    s.co2_ppm, s.relative_humidity
                );
            }
            AppEvent::SensorFault(e) => {
                warn!("SAMPLE | fault: {}", e);
            }
            AppEvent::LinkUp(id) => {
                info!("LINK | up ip={} mac={}", id.ip, id.mac_string());
            }
            AppEvent::LinkDown(code) => {
                warn!("LINK | down status={:?} ({})", code, code.code());
            }
            AppEvent::StaticAddress(id) => {
                info!("LINK | static ip={}", id.ip);
            }
            AppEvent::BrokerConnected => {
                info!("MQTT | connected");
            }
            AppEvent::BrokerFailed(e) => {
                warn!("MQTT | {}", e);
            }
            AppEvent::Published { bytes } => {
                info!("MQTT | published {} bytes", bytes);
            }
            AppEvent::PublishFailed(e) => {
                warn!("MQTT | {}", e);
            }
            AppEvent::TelemetryDropped => {
                warn!("MQTT | telemetry dropped this cycle");
            }
        }
    }
}
