//! Telemetry message and its JSON wire format.
//!
//! The payload is a JSON object with keys in lexicographic order:
//!
//! ```json
//! {"CO2":850,"Date/Time":"10-03-2024 06:01:01","Humidity":"55",
//!  "PublishIP":"10.99.96.8","PublishMac":"28:cd:c1:0a:b3:ff","Temperature":"24.3"}
//! ```
//!
//! Deployed dashboards that predate the object form consume a sorted list
//! of `[key, value]` pairs instead; [`WireLayout::PairList`] produces it.

use std::net::Ipv4Addr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::network::link::{LinkIdentity, format_mac};
use crate::sensor::MeasurementSample;

pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WireLayout {
    /// `{"CO2": .., "Date/Time": .., ...}`
    #[default]
    Object,
    /// `[["CO2", ..], ["Date/Time", ..], ...]`
    PairList,
}

/// One telemetry record, built fresh for every publish attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryMessage {
    pub source_ip: Ipv4Addr,
    pub source_mac: [u8; 6],
    pub timestamp: NaiveDateTime,
    pub temperature_c: f32,
    pub relative_humidity: f32,
    pub co2_ppm: u16,
}

/// Field order here is the wire order; keep it sorted by key.
#[derive(Serialize)]
struct WireObject<'a> {
    #[serde(rename = "CO2")]
    co2: u16,
    #[serde(rename = "Date/Time")]
    date_time: &'a str,
    #[serde(rename = "Humidity")]
    humidity: &'a str,
    #[serde(rename = "PublishIP")]
    publish_ip: &'a str,
    #[serde(rename = "PublishMac")]
    publish_mac: &'a str,
    #[serde(rename = "Temperature")]
    temperature: &'a str,
}

impl TelemetryMessage {
    pub fn new(sample: &MeasurementSample, identity: &LinkIdentity, timestamp: NaiveDateTime) -> Self {
        Self {
            source_ip: identity.ip,
            source_mac: identity.mac,
            timestamp,
            temperature_c: sample.temperature_c,
            relative_humidity: sample.relative_humidity,
            co2_ppm: sample.co2_ppm,
        }
    }

    /// Serialize to UTF-8 JSON bytes.
    pub fn encode(&self, layout: WireLayout) -> Result<Vec<u8>, serde_json::Error> {
        let date_time = self.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let humidity = format!("{:.0}", self.relative_humidity);
        let publish_ip = self.source_ip.to_string();
        let publish_mac = format_mac(&self.source_mac);
        let temperature = format!("{:.1}", self.temperature_c);

        let wire = WireObject {
            co2: self.co2_ppm,
            date_time: &date_time,
            humidity: &humidity,
            publish_ip: &publish_ip,
            publish_mac: publish_mac.as_str(),
            temperature: &temperature,
        };

        match layout {
            WireLayout::Object => serde_json::to_vec(&wire),
            WireLayout::PairList => {
                // Without `preserve_order`, the map iterates in key order.
                match serde_json::to_value(&wire)? {
                    Value::Object(fields) => {
                        let pairs: Vec<(String, Value)> = fields.into_iter().collect();
                        serde_json::to_vec(&pairs)
                    }
                    other => serde_json::to_vec(&other),
                }
            }
        }
    }
}
