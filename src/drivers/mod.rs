//! On-chip peripheral drivers that sit outside the port traits.

pub mod watchdog;
