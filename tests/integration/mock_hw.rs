//! Mock adapters for integration tests.
//!
//! Records every screen and event so tests can assert on the full history
//! without a real LCD or serial console.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime};
use co2node::adapters::sim_scd4x::SimScd4x;
use co2node::app::events::AppEvent;
use co2node::app::ports::{DisplayPort, EventSink, WallClock};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, Operation};

// ── RecordingDisplay ──────────────────────────────────────────

/// Every screen drawn since creation, as (row 0, row 1).
#[derive(Default)]
pub struct RecordingDisplay {
    pub screens: Vec<(String, String)>,
    row: u8,
}

#[allow(dead_code)]
impl RecordingDisplay {
    pub fn shows(&self, line1: &str, line2: &str) -> bool {
        self.screens.iter().any(|(a, b)| a == line1 && b == line2)
    }

    pub fn last(&self) -> Option<&(String, String)> {
        self.screens.last()
    }
}

impl DisplayPort for RecordingDisplay {
    fn clear(&mut self) {
        self.screens.push((String::new(), String::new()));
        self.row = 0;
    }

    fn move_to(&mut self, _col: u8, row: u8) {
        self.row = row;
    }

    fn put_str(&mut self, s: &str) {
        if let Some((line1, line2)) = self.screens.last_mut() {
            if self.row == 0 {
                line1.push_str(s);
            } else {
                line2.push_str(s);
            }
        }
    }
}

// ── EventLog ──────────────────────────────────────────────────

#[derive(Default)]
pub struct EventLog {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl EventLog {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}

// ── FixedClock ────────────────────────────────────────────────

/// Wall clock frozen at 10-03-2024 06:01:01.
pub struct FixedClock(pub NaiveDateTime);

impl Default for FixedClock {
    fn default() -> Self {
        Self(
            NaiveDate::from_ymd_opt(2024, 3, 10)
                .and_then(|d| d.and_hms_opt(6, 1, 1))
                .unwrap_or_default(),
        )
    }
}

impl WallClock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

// ── FlakyBus ──────────────────────────────────────────────────

/// Simulated sensor bus that can flip a bit in the next read.
#[derive(Clone)]
pub struct FlakyBus {
    inner: SimScd4x,
    corrupt_next_read: Rc<Cell<bool>>,
}

#[allow(dead_code)]
impl FlakyBus {
    pub fn new(inner: SimScd4x) -> Self {
        Self {
            inner,
            corrupt_next_read: Rc::new(Cell::new(false)),
        }
    }

    pub fn corrupt_next_read(&self) {
        self.corrupt_next_read.set(true);
    }
}

impl ErrorType for FlakyBus {
    type Error = ErrorKind;
}

impl I2c for FlakyBus {
    fn transaction(&mut self, address: u8, ops: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        self.inner.transaction(address, ops)?;
        for op in ops.iter_mut() {
            if let Operation::Read(buf) = op {
                if self.corrupt_next_read.replace(false) {
                    if let Some(first) = buf.first_mut() {
                        *first ^= 0x01;
                    }
                }
            }
        }
        Ok(())
    }
}
