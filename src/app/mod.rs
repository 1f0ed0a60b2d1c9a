//! Application core — orchestration logic, zero direct I/O.
//!
//! This module contains the rules of the node: bring-up order, the
//! measure → publish cycle, and the recovery branches after a failed
//! publish.  All interaction with hardware happens through **port traits**
//! defined in [`ports`], keeping this layer testable without real
//! peripherals.

pub mod events;
pub mod ports;
pub mod service;
