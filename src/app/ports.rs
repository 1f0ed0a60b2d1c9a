//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TelemetryService (domain)
//! ```
//!
//! Driven adapters (display, radio, broker client, storage, clock, event
//! sinks) implement these traits.  The
//! [`TelemetryService`](super::service::TelemetryService) consumes them via
//! generics, so the domain core never touches hardware directly.  The
//! sensor itself sits behind `embedded_hal::i2c::I2c` and needs no port of
//! its own.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - All port errors are typed; callers must handle every variant explicitly.

use chrono::NaiveDateTime;

use crate::config::{BrokerConfig, NodeConfig};
use crate::error::{ConfigError, LinkError, TransportError};
use crate::network::link::{IpConfig, LinkStatusCode};

// ───────────────────────────────────────────────────────────────
// Display port (driven adapter: domain → operator)
// ───────────────────────────────────────────────────────────────

/// A small character display addressed by column and row.
pub trait DisplayPort {
    fn clear(&mut self);

    /// Move the cursor to `col` (0-based) on `row` (0-based).
    fn move_to(&mut self, col: u8, row: u8);

    /// Write `s` at the cursor.  Characters the display cannot render are
    /// substituted, not rejected.
    fn put_str(&mut self, s: &str);
}

// ───────────────────────────────────────────────────────────────
// Wireless port (driven adapter: domain ↔ radio)
// ───────────────────────────────────────────────────────────────

/// Station-mode wireless interface.
pub trait WirelessPort {
    /// Power up the radio in station mode.  Idempotent.
    fn activate(&mut self) -> Result<(), LinkError>;

    /// Set the regulatory domain (ISO 3166 alpha-2) that bounds channels
    /// and transmit power.  Applies to the next join.
    fn set_country(&mut self, code: &str) -> Result<(), LinkError>;

    /// Start joining `ssid`.  Returns once the attempt is under way; progress
    /// is observed through [`status`](Self::status).
    fn begin_join(&mut self, ssid: &str, password: &str) -> Result<(), LinkError>;

    fn status(&mut self) -> LinkStatusCode;

    fn mac(&self) -> [u8; 6];

    /// Current interface addressing, if any has been assigned.
    fn ip_config(&self) -> Option<IpConfig>;

    fn set_ip_config(&mut self, config: &IpConfig) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Messaging port (driven adapter: domain → broker)
// ───────────────────────────────────────────────────────────────

/// Publish-only client for the telemetry broker.
pub trait MessagingPort {
    /// Open a session with the broker.  A previous session, if any, is
    /// replaced.
    fn connect(&mut self, config: &BrokerConfig) -> Result<(), TransportError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Wall clock port
// ───────────────────────────────────────────────────────────────

/// Local civil time for telemetry timestamps.
pub trait WallClock {
    fn now(&self) -> NaiveDateTime;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid values are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`NodeConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}
