//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the simulated sensor, radio and broker.  All tests run on the
//! host (x86_64) with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod mock_hw;
mod sensor_tests;
mod service_tests;
