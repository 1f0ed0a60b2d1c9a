//! Unified error types for the co2node firmware.
//!
//! One `Error` enum that every subsystem converts into, so the start-up path
//! and the binary boundary handle failures uniformly.  All variants are
//! `Copy` so they can travel through [`AppEvent`](crate::app::events::AppEvent)
//! and the recovery branches without allocation.

use core::fmt;

use embedded_hal::i2c::ErrorKind;

use crate::sensor::SensorMode;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The measurement device or its bus failed.
    Sensor(SensorError),
    /// The wireless link could not be brought up or configured.
    Link(LinkError),
    /// The broker could not be reached or rejected a publish.
    Broker(BrokerError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Broker(e) => write!(f, "broker: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Bus fault or a command the device refused (NACK).
    Protocol(ErrorKind),
    /// A data word failed its CRC-8 check.
    Crc,
    /// Measurement requested before the device raised its ready flag.
    NotReady,
    /// Operation is not valid in the current measurement mode.
    ModeConflict(SensorMode),
    /// Argument outside what the device can represent.  Nothing was sent.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(kind) => write!(f, "protocol error ({kind})"),
            Self::Crc => write!(f, "CRC mismatch"),
            Self::NotReady => write!(f, "measurement not ready"),
            Self::ModeConflict(mode) => write!(f, "not allowed while {mode:?}"),
            Self::OutOfRange => write!(f, "argument out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The radio could not be switched on.
    Activation,
    /// The stack refused to start association (bad SSID/credentials shape).
    Association,
    /// Static or DHCP address configuration failed.
    IpConfig,
    /// The regulatory domain was malformed or refused by the radio.
    Country,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activation => write!(f, "radio activation failed"),
            Self::Association => write!(f, "association failed"),
            Self::IpConfig => write!(f, "IP configuration failed"),
            Self::Country => write!(f, "country code rejected"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Broker errors
// ---------------------------------------------------------------------------

/// Failure reported by the messaging client transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Host unreachable or TCP connect failed.
    Unreachable,
    /// Broker answered but refused the session (auth, client id).
    Refused,
    /// Socket-level failure on an established session.
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "unreachable"),
            Self::Refused => write!(f, "refused"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// Session establishment failed.
    Connect(TransportError),
    /// A publish attempt failed on an established session.
    Publish(TransportError),
    /// Publish attempted with no broker session.
    NotConnected,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "connect failed: {e}"),
            Self::Publish(e) => write!(f, "publish failed: {e}"),
            Self::NotConnected => write!(f, "not connected"),
        }
    }
}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        Self::Broker(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from [`ConfigPort`](crate::app::ports::ConfigPort) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
