//! Outbound application events.
//!
//! The [`TelemetryService`](super::service::TelemetryService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log to serial, count them
//! in a test, etc.

use crate::error::{BrokerError, SensorError};
use crate::network::link::{LinkIdentity, LinkStatusCode};
use crate::sensor::MeasurementSample;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// Bring-up finished; carries the sensor's factory serial number.
    Started { serial: u64 },

    /// A measurement was read.
    Sample(MeasurementSample),

    /// The reading is outside the device's rated range.  It is still
    /// published; downstream decides whether to trust it.
    ImplausibleSample(MeasurementSample),

    /// The sensor failed mid-cycle; the cycle was abandoned.
    SensorFault(SensorError),

    LinkUp(LinkIdentity),

    /// Joining failed or timed out.
    LinkDown(LinkStatusCode),

    /// A static address was applied (site address or fallback).
    StaticAddress(LinkIdentity),

    BrokerConnected,

    BrokerFailed(BrokerError),

    /// Telemetry reached the broker.
    Published { bytes: usize },

    PublishFailed(BrokerError),

    /// This cycle's telemetry was discarded.
    TelemetryDropped,
}
