//! Node configuration parameters
//!
//! All tunable parameters for the co2node firmware.
//! Credential defaults are baked in at build time from `CO2NODE_*`
//! environment variables; a blob stored in NVS overrides the whole set.

use serde::{Deserialize, Serialize};

use crate::adapters::mqtt::CONNECT_WAIT_MS;
use crate::adapters::utils::is_printable_ascii;
use crate::drivers::watchdog;
use crate::error::ConfigError;
use crate::network::LINK_POLL_MS;
use crate::network::link::IpConfig;
use crate::sensor::scd4x::STOP_PERIODIC;
use crate::sensor::{CycleTiming, SensorMode};
use crate::telemetry::WireLayout;

pub type Ssid = heapless::String<32>;
pub type Secret = heapless::String<64>;
pub type Host = heapless::String<64>;
pub type Topic = heapless::String<64>;
pub type ClientId = heapless::String<32>;
pub type Username = heapless::String<32>;

/// Static addressing used when the access point cannot be joined.
pub const FALLBACK_IP: IpConfig =
    IpConfig::new([192, 168, 1, 151], [255, 255, 255, 0], [192, 168, 1, 1], [8, 8, 8, 8]);

/// Operator messages held on the longest path through one publish cycle:
/// the reading, the publish failure, and three recovery screens.
pub const HOLDS_PER_CYCLE: u32 = 5;

/// Slack added on top of the worst-case cycle before the watchdog bites.
pub const WATCHDOG_MARGIN_MS: u32 = 30_000;

/// Build-time string default; empty if unset or longer than `N`.
fn baked<const N: usize>(value: Option<&'static str>, fallback: &str) -> heapless::String<N> {
    heapless::String::try_from(value.unwrap_or(fallback)).unwrap_or_default()
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeConfig {
    pub sensor: SensorConfig,
    pub wifi: WifiConfig,
    pub broker: BrokerConfig,
    pub display: DisplayConfig,
    /// Local time offset from UTC, minutes east.
    pub utc_offset_minutes: i16,
    pub wire_layout: WireLayout,
}

// --- Sensor ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Installation altitude, metres above sea level
    pub altitude_m: u16,
    /// Temperature offset (°C) to program; `None` keeps the device's value
    pub temperature_offset_c: Option<f32>,
    /// Base conversion cycle (milliseconds)
    pub base_cycle_ms: u32,
    /// Readings per warm-up pattern at bring-up (0 skips warm-up)
    pub warmup_samples: u8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            altitude_m: 44,
            temperature_offset_c: None,
            base_cycle_ms: crate::sensor::timing::BASE_CYCLE_MS,
            warmup_samples: 5,
        }
    }
}

// --- WiFi ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiConfig {
    pub ssid: Ssid,
    pub password: Secret,
    /// Regulatory domain (ISO 3166 alpha-2)
    pub country: heapless::String<2>,
    /// Join timeout (seconds), polled once per second
    pub connect_timeout_secs: u32,
    /// Site address applied once the link is up; `None` keeps DHCP
    pub site_ip: Option<IpConfig>,
    /// Address applied when the link cannot be joined
    pub fallback_ip: IpConfig,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: baked(option_env!("CO2NODE_WIFI_SSID"), ""),
            password: baked(option_env!("CO2NODE_WIFI_PASS"), ""),
            country: baked(None, "TH"),
            connect_timeout_secs: 10,
            site_ip: None,
            fallback_ip: FALLBACK_IP,
        }
    }
}

// --- Broker ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub client_id: ClientId,
    pub host: Host,
    pub port: u16,
    pub username: Username,
    pub password: Secret,
    pub topic: Topic,
    pub keepalive_secs: u16,
    /// Wait before the single reconnect attempt (milliseconds)
    pub reconnect_delay_ms: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            client_id: baked(None, "co2node"),
            host: baked(option_env!("CO2NODE_MQTT_HOST"), "broker.local"),
            port: 1883,
            username: baked(option_env!("CO2NODE_MQTT_USER"), ""),
            password: baked(option_env!("CO2NODE_MQTT_PASS"), ""),
            topic: baked(option_env!("CO2NODE_MQTT_TOPIC"), "co2node/telemetry"),
            keepalive_secs: 60,
            reconnect_delay_ms: 5_000,
        }
    }
}

// --- Display ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// How long each operator message stays up (milliseconds)
    pub hold_ms: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { hold_ms: 3_000 }
    }
}

impl NodeConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sensor;
        if s.altitude_m > 3_000 {
            return Err(ConfigError::ValidationFailed("sensor.altitude_m must be 0–3000"));
        }
        if let Some(offset) = s.temperature_offset_c {
            if !(0.0..=20.0).contains(&offset) {
                return Err(ConfigError::ValidationFailed(
                    "sensor.temperature_offset_c must be 0.0–20.0",
                ));
            }
        }
        if !(1_000..=60_000).contains(&s.base_cycle_ms) {
            return Err(ConfigError::ValidationFailed("sensor.base_cycle_ms must be 1000–60000"));
        }

        let w = &self.wifi;
        if w.ssid.is_empty() || !is_printable_ascii(&w.ssid) {
            return Err(ConfigError::ValidationFailed(
                "wifi.ssid must be 1-32 printable ASCII bytes",
            ));
        }
        if !w.password.is_empty() && !(8..=63).contains(&w.password.len()) {
            return Err(ConfigError::ValidationFailed(
                "wifi.password must be empty or 8-63 bytes",
            ));
        }
        if w.country.len() != 2 || !w.country.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ConfigError::ValidationFailed("wifi.country must be two uppercase letters"));
        }
        if !(1..=120).contains(&w.connect_timeout_secs) {
            return Err(ConfigError::ValidationFailed("wifi.connect_timeout_secs must be 1–120"));
        }
        if w.site_ip.is_some_and(|ip| !ip.is_valid()) {
            return Err(ConfigError::ValidationFailed("wifi.site_ip is not a usable address"));
        }
        if !w.fallback_ip.is_valid() {
            return Err(ConfigError::ValidationFailed("wifi.fallback_ip is not a usable address"));
        }

        let b = &self.broker;
        if b.host.is_empty() || !is_printable_ascii(&b.host) {
            return Err(ConfigError::ValidationFailed("broker.host must be printable ASCII"));
        }
        if b.client_id.is_empty() {
            return Err(ConfigError::ValidationFailed("broker.client_id must not be empty"));
        }
        if b.port == 0 {
            return Err(ConfigError::ValidationFailed("broker.port must be non-zero"));
        }
        if b.topic.is_empty() || b.topic.contains(['#', '+']) {
            return Err(ConfigError::ValidationFailed(
                "broker.topic must be non-empty without wildcards",
            ));
        }
        if b.keepalive_secs == 0 {
            return Err(ConfigError::ValidationFailed("broker.keepalive_secs must be non-zero"));
        }
        if b.reconnect_delay_ms > 60_000 {
            return Err(ConfigError::ValidationFailed("broker.reconnect_delay_ms must be ≤ 60000"));
        }

        if self.display.hold_ms > 10_000 {
            return Err(ConfigError::ValidationFailed("display.hold_ms must be ≤ 10000"));
        }
        if !(-720..=840).contains(&self.utc_offset_minutes) {
            return Err(ConfigError::ValidationFailed("utc_offset_minutes must be -720–840"));
        }
        Ok(())
    }

    /// Longest a single publish cycle can block: a single-shot conversion,
    /// every display hold, a link join that runs to its timeout, a broker
    /// connect that waits out its CONNACK window, and a measurement stop.
    pub fn worst_case_cycle_ms(&self) -> u32 {
        let conversion = CycleTiming::new(self.sensor.base_cycle_ms)
            .for_mode(SensorMode::SingleShotPending, false);
        let holds = self.display.hold_ms.saturating_mul(HOLDS_PER_CYCLE);
        let join = self.wifi.connect_timeout_secs.saturating_mul(LINK_POLL_MS);
        conversion
            .saturating_add(holds)
            .saturating_add(join)
            .saturating_add(CONNECT_WAIT_MS)
            .saturating_add(STOP_PERIODIC.exec_ms)
    }

    /// Task watchdog timeout that no cycle of this configuration can
    /// outlast.  Never shorter than [`watchdog::DEFAULT_TIMEOUT_MS`].
    pub fn watchdog_timeout_ms(&self) -> u32 {
        self.worst_case_cycle_ms()
            .saturating_add(WATCHDOG_MARGIN_MS)
            .max(watchdog::DEFAULT_TIMEOUT_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provisioned() -> NodeConfig {
        let mut c = NodeConfig::default();
        c.wifi.ssid = baked(None, "lab-2g");
        c.wifi.password = baked(None, "password1");
        c
    }

    #[test]
    fn defaults_match_deployment() {
        let c = NodeConfig::default();
        assert_eq!(c.sensor.altitude_m, 44);
        assert_eq!(c.sensor.base_cycle_ms, 5_000);
        assert_eq!(c.wifi.connect_timeout_secs, 10);
        assert_eq!(c.wifi.fallback_ip.address, [192, 168, 1, 151]);
        assert_eq!(c.broker.port, 1883);
        assert_eq!(c.broker.keepalive_secs, 60);
        assert_eq!(c.broker.reconnect_delay_ms, 5_000);
        assert_eq!(c.display.hold_ms, 3_000);
        assert_eq!(c.wire_layout, WireLayout::Object);
    }

    #[test]
    fn provisioned_defaults_validate() {
        provisioned().validate().unwrap();
    }

    #[test]
    fn default_cycle_fits_default_watchdog() {
        let c = provisioned();
        // 15 s shot + 5 × 3 s holds + 10 s join + 5 s CONNACK + 0.5 s stop
        assert_eq!(c.worst_case_cycle_ms(), 50_500);
        assert_eq!(c.watchdog_timeout_ms(), watchdog::DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn slowest_valid_config_stretches_watchdog() {
        let mut c = provisioned();
        c.sensor.base_cycle_ms = 60_000;
        c.display.hold_ms = 10_000;
        c.wifi.connect_timeout_secs = 120;
        c.validate().unwrap();

        assert_eq!(c.worst_case_cycle_ms(), 180_000 + 50_000 + 120_000 + 5_000 + 500);
        assert!(c.watchdog_timeout_ms() > c.worst_case_cycle_ms());
        assert!(c.watchdog_timeout_ms() > watchdog::DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn missing_ssid_is_rejected() {
        let mut c = provisioned();
        c.wifi.ssid.clear();
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn wildcard_topic_is_rejected() {
        let mut c = provisioned();
        c.broker.topic = baked(None, "sensors/#");
        assert!(c.validate().is_err());
    }

    #[test]
    fn out_of_range_offset_is_rejected_not_clamped() {
        let mut c = provisioned();
        c.sensor.temperature_offset_c = Some(25.0);
        assert!(c.validate().is_err());
        assert_eq!(c.sensor.temperature_offset_c, Some(25.0));
    }

    #[test]
    fn bad_site_netmask_is_rejected() {
        let mut c = provisioned();
        c.wifi.site_ip = Some(IpConfig::new([10, 99, 96, 8], [255, 0, 255, 0], [10, 99, 103, 254], [8, 8, 8, 8]));
        assert!(c.validate().is_err());
    }

    #[test]
    fn overlong_build_value_falls_back_to_empty() {
        let s: heapless::String<4> = baked(Some("too long"), "");
        assert!(s.is_empty());
    }

    #[test]
    fn postcard_roundtrip() {
        let mut c = provisioned();
        c.wifi.site_ip = Some(IpConfig::new([10, 99, 96, 8], [255, 255, 248, 0], [10, 99, 103, 254], [8, 8, 8, 8]));
        c.sensor.temperature_offset_c = Some(4.0);
        c.wire_layout = WireLayout::PairList;
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: NodeConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn serde_json_roundtrip() {
        let c = provisioned();
        let json = serde_json::to_string(&c).unwrap();
        let c2: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }
}
