//! co2node firmware library.
//!
//! Exposes the sensor, network and application modules for integration
//! testing. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; on other targets the
//! adapters run against in-memory simulations.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod network;
pub mod pins;
pub mod sensor;
pub mod telemetry;
