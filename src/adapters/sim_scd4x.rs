//! Host-side SCD4x simulator.
//!
//! Implements `embedded_hal::i2c::I2c` and answers the same command set the
//! [`Scd4x`](crate::sensor::Scd4x) driver speaks, including CRC framing.
//! Timing follows a shared [`ClockAdapter`]: periodic measurements complete
//! every interval after start, and a single shot completes one interval
//! after arming.  Like the real part, it NACKs configuration and start
//! commands while a measurement is running.
//!
//! Clones share state, so a test can keep a handle for fault injection
//! while the driver owns the other.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use super::time::ClockAdapter;
use crate::sensor::scd4x::{self, DEFAULT_ADDRESS, decode_words, encode_word};
use crate::sensor::timing::{BASE_CYCLE_MS, RHT_ONLY_CYCLE_MS};

const NACK: ErrorKind = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data);

#[derive(Debug, Clone, Copy, PartialEq)]
enum DeviceMode {
    Idle,
    Periodic { started_ms: u64, consumed: u64 },
    SingleShot { armed_ms: u64, duration_ms: u64, rht_only: bool, consumed: bool },
}

struct Device {
    mode: DeviceMode,
    interval_ms: u64,
    co2: u16,
    co2_step: u16,
    raw_temperature: u16,
    raw_humidity: u16,
    altitude: u16,
    temperature_offset: u16,
    asc_enabled: bool,
    serial: [u16; 3],
    response: Vec<u8>,
    fail_next: u32,
    commands: u32,
}

impl Device {
    fn new() -> Self {
        Self {
            mode: DeviceMode::Idle,
            interval_ms: u64::from(BASE_CYCLE_MS),
            co2: 400,
            co2_step: 0,
            raw_temperature: encode_temperature(25.0),
            raw_humidity: encode_humidity(50.0),
            altitude: 0,
            // Factory default offset is 4 °C.
            temperature_offset: 1498,
            asc_enabled: true,
            serial: [0x1234, 0x5678, 0x9ABC],
            response: Vec::new(),
            fail_next: 0,
            commands: 0,
        }
    }

    /// Whether the device is free to accept start/arm/config commands.
    fn accepts_commands(&self, now: u64) -> bool {
        match self.mode {
            DeviceMode::Idle => true,
            DeviceMode::Periodic { .. } => false,
            DeviceMode::SingleShot { armed_ms, duration_ms, .. } => now >= armed_ms + duration_ms,
        }
    }

    /// Index (1-based) of the freshest unread measurement, if any.
    fn ready_index(&self, now: u64) -> Option<u64> {
        match self.mode {
            DeviceMode::Idle => None,
            DeviceMode::Periodic { started_ms, consumed } => {
                let latest = now.saturating_sub(started_ms) / self.interval_ms;
                (latest > consumed).then_some(latest)
            }
            DeviceMode::SingleShot { armed_ms, duration_ms, consumed, .. } => {
                (!consumed && now >= armed_ms + duration_ms).then_some(1)
            }
        }
    }

    fn respond(&mut self, words: &[u16]) {
        self.response.clear();
        for w in words {
            self.response.extend_from_slice(&encode_word(*w));
        }
    }

    fn write(&mut self, bytes: &[u8], now: u64) -> Result<(), ErrorKind> {
        self.commands += 1;
        if bytes.len() < 2 {
            return Err(NACK);
        }
        let code = u16::from_be_bytes([bytes[0], bytes[1]]);
        let argument = if bytes.len() == 5 {
            let mut word = [0u16; 1];
            decode_words(&bytes[2..5], &mut word).map_err(|_| NACK)?;
            Some(word[0])
        } else {
            None
        };
        let idle = self.accepts_commands(now);
        self.response.clear();

        match code {
            c if c == scd4x::START_PERIODIC.code => {
                if !idle {
                    return Err(NACK);
                }
                self.mode = DeviceMode::Periodic { started_ms: now, consumed: 0 };
            }
            c if c == scd4x::STOP_PERIODIC.code => self.mode = DeviceMode::Idle,
            c if c == scd4x::MEASURE_SINGLE_SHOT.code
                || c == scd4x::MEASURE_SINGLE_SHOT_RHT_ONLY.code =>
            {
                if !idle {
                    return Err(NACK);
                }
                let rht_only = c == scd4x::MEASURE_SINGLE_SHOT_RHT_ONLY.code;
                let duration_ms = if rht_only {
                    u64::from(RHT_ONLY_CYCLE_MS)
                } else {
                    self.interval_ms
                };
                self.mode = DeviceMode::SingleShot {
                    armed_ms: now,
                    duration_ms,
                    rht_only,
                    consumed: false,
                };
            }
            c if c == scd4x::GET_DATA_READY.code => {
                let status = if self.ready_index(now).is_some() { 0x8006 } else { 0x8000 };
                self.respond(&[status]);
            }
            c if c == scd4x::READ_MEASUREMENT.code => {
                let index = self.ready_index(now).ok_or(NACK)?;
                let co2 = self.co2.wrapping_add(self.co2_step.wrapping_mul((index - 1) as u16));
                let mut rht_only = false;
                match &mut self.mode {
                    DeviceMode::Periodic { consumed, .. } => *consumed = index,
                    DeviceMode::SingleShot { consumed, rht_only: r, .. } => {
                        *consumed = true;
                        rht_only = *r;
                    }
                    DeviceMode::Idle => {}
                }
                let co2 = if rht_only { 0 } else { co2 };
                self.respond(&[co2, self.raw_temperature, self.raw_humidity]);
            }
            c if c == scd4x::SET_TEMPERATURE_OFFSET.code && idle => {
                self.temperature_offset = argument.ok_or(NACK)?;
            }
            c if c == scd4x::GET_TEMPERATURE_OFFSET.code && idle => {
                self.respond(&[self.temperature_offset]);
            }
            c if c == scd4x::SET_ALTITUDE.code && idle => {
                self.altitude = argument.ok_or(NACK)?;
            }
            c if c == scd4x::GET_ALTITUDE.code && idle => self.respond(&[self.altitude]),
            c if c == scd4x::GET_ASC_ENABLED.code && idle => {
                self.respond(&[u16::from(self.asc_enabled)]);
            }
            c if c == scd4x::GET_SERIAL_NUMBER.code && idle => {
                let serial = self.serial;
                self.respond(&serial);
            }
            _ => return Err(NACK),
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), ErrorKind> {
        if self.response.len() < buf.len() {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        buf.copy_from_slice(&self.response[..buf.len()]);
        self.response.clear();
        Ok(())
    }
}

fn encode_temperature(celsius: f32) -> u16 {
    ((celsius + 45.0) * 65535.0 / 175.0).round().clamp(0.0, 65535.0) as u16
}

fn encode_humidity(percent: f32) -> u16 {
    (percent * 65535.0 / 100.0).round().clamp(0.0, 65535.0) as u16
}

/// Simulated SCD4x on the I2C bus.
#[derive(Clone)]
pub struct SimScd4x {
    device: Rc<RefCell<Device>>,
    clock: ClockAdapter,
}

impl SimScd4x {
    pub fn new(clock: ClockAdapter) -> Self {
        Self {
            device: Rc::new(RefCell::new(Device::new())),
            clock,
        }
    }

    /// Set the conditions every following measurement reports.
    pub fn set_environment(&self, co2_ppm: u16, temperature_c: f32, humidity_pct: f32) {
        let mut dev = self.device.borrow_mut();
        dev.co2 = co2_ppm;
        dev.raw_temperature = encode_temperature(temperature_c);
        dev.raw_humidity = encode_humidity(humidity_pct);
    }

    /// Add `step` ppm to CO2 for each successive periodic measurement, so
    /// tests can tell readings apart.
    pub fn set_co2_step(&self, step: u16) {
        self.device.borrow_mut().co2_step = step;
    }

    /// Time the device needs per measurement (default one base cycle).
    pub fn set_measurement_interval_ms(&self, ms: u64) {
        self.device.borrow_mut().interval_ms = ms.max(1);
    }

    /// Fail the next `n` bus transactions with `ErrorKind::Bus`.
    pub fn fail_next(&self, n: u32) {
        self.device.borrow_mut().fail_next = n;
    }

    /// Number of command writes the device has seen.
    pub fn command_count(&self) -> u32 {
        self.device.borrow().commands
    }

    pub fn is_measuring(&self) -> bool {
        let now = self.clock.now_ms();
        !self.device.borrow().accepts_commands(now)
    }
}

impl ErrorType for SimScd4x {
    type Error = ErrorKind;
}

impl I2c for SimScd4x {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != DEFAULT_ADDRESS {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        let now = self.clock.now_ms();
        let mut dev = self.device.borrow_mut();
        if dev.fail_next > 0 {
            dev.fail_next -= 1;
            return Err(ErrorKind::Bus);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => dev.write(bytes, now)?,
                Operation::Read(buf) => dev.read(buf)?,
            }
        }
        Ok(())
    }
}
