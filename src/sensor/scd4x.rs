//! Sensirion SCD4x CO2 / temperature / humidity sensor driver.
//!
//! Talks the Sensirion word protocol over any `embedded_hal::i2c::I2c`:
//! every transfer starts with a 16-bit big-endian command, and every
//! 16-bit data word on the wire is followed by its CRC-8.
//!
//! The driver mirrors the device's measurement mode so it can refuse
//! commands the device would NACK and report the matching conversion
//! cycle.  It never retries: bus faults surface as
//! [`SensorError::Protocol`].

use crc::{CRC_8_NRSC_5, Crc};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, I2c, NoAcknowledgeSource};
use log::{debug, info};

use super::timing::CycleTiming;
use super::{MeasurementSample, SensorMode};
use crate::error::SensorError;

/// Fixed 7-bit I2C address of every SCD4x part.
pub const DEFAULT_ADDRESS: u8 = 0x62;

/// Sensirion word checksum: poly 0x31, init 0xFF, no reflection.
const WORD_CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_NRSC_5);

/// Largest response we read: three words (serial number, measurement).
const MAX_READ_WORDS: usize = 3;

/// Full scale of the temperature-offset word (°C).
const MAX_TEMPERATURE_OFFSET_C: f32 = 175.0;

/// What the device answers with when it refuses a command in the wrong mode.
const REFUSED: SensorError =
    SensorError::Protocol(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));

// ---------------------------------------------------------------------------
// Command set
// ---------------------------------------------------------------------------

/// A device command and the time the device needs to execute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub code: u16,
    pub exec_ms: u32,
}

impl Command {
    const fn new(code: u16, exec_ms: u32) -> Self {
        Self { code, exec_ms }
    }
}

pub const START_PERIODIC: Command = Command::new(0x21B1, 0);
pub const STOP_PERIODIC: Command = Command::new(0x3F86, 500);
pub const READ_MEASUREMENT: Command = Command::new(0xEC05, 1);
pub const GET_DATA_READY: Command = Command::new(0xE4B8, 1);
pub const SET_TEMPERATURE_OFFSET: Command = Command::new(0x241D, 1);
pub const GET_TEMPERATURE_OFFSET: Command = Command::new(0x2318, 1);
pub const SET_ALTITUDE: Command = Command::new(0x2427, 1);
pub const GET_ALTITUDE: Command = Command::new(0x2322, 1);
pub const GET_ASC_ENABLED: Command = Command::new(0x2313, 1);
pub const GET_SERIAL_NUMBER: Command = Command::new(0x3682, 1);
pub const MEASURE_SINGLE_SHOT: Command = Command::new(0x219D, 0);
pub const MEASURE_SINGLE_SHOT_RHT_ONLY: Command = Command::new(0x2196, 0);

// ---------------------------------------------------------------------------
// Word framing
// ---------------------------------------------------------------------------

/// CRC-8 of one big-endian data word.
pub fn word_crc(word: u16) -> u8 {
    WORD_CRC.checksum(&word.to_be_bytes())
}

/// Frame one data word as `[msb, lsb, crc]`.
pub fn encode_word(word: u16) -> [u8; 3] {
    let [msb, lsb] = word.to_be_bytes();
    [msb, lsb, word_crc(word)]
}

/// Decode CRC-protected words from `buf` into `out`.
///
/// `buf` must hold exactly `3 * out.len()` bytes.
pub fn decode_words(buf: &[u8], out: &mut [u16]) -> Result<(), SensorError> {
    if buf.len() != out.len() * 3 {
        return Err(SensorError::Crc);
    }
    for (chunk, word) in buf.chunks_exact(3).zip(out.iter_mut()) {
        let value = u16::from_be_bytes([chunk[0], chunk[1]]);
        if word_crc(value) != chunk[2] {
            return Err(SensorError::Crc);
        }
        *word = value;
    }
    Ok(())
}

fn bus_error<E: embedded_hal::i2c::Error>(e: E) -> SensorError {
    SensorError::Protocol(e.kind())
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct Scd4x<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    mode: SensorMode,
    rht_only: bool,
    timing: CycleTiming,
}

impl<I2C: I2c, D: DelayNs> Scd4x<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_timing(i2c, delay, CycleTiming::default())
    }

    pub fn with_timing(i2c: I2C, delay: D, timing: CycleTiming) -> Self {
        Self {
            i2c,
            delay,
            address: DEFAULT_ADDRESS,
            mode: SensorMode::Idle,
            rht_only: false,
            timing,
        }
    }

    /// Release the bus and delay handles.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Measurement mode the driver last commanded.
    pub fn mode(&self) -> SensorMode {
        self.mode
    }

    // ── Measurement control ──────────────────────────────────

    /// Command a measurement-mode transition.
    ///
    /// * `single_shot` — arm one measurement (`rht_only` skips CO2).
    /// * otherwise `start` starts periodic measurement, `!start` stops it.
    ///
    /// Start and arm are refused unless the device is idle; stop is
    /// accepted in every mode.
    pub fn set_measurement(
        &mut self,
        start: bool,
        single_shot: bool,
        rht_only: bool,
    ) -> Result<(), SensorError> {
        if single_shot {
            if self.mode != SensorMode::Idle {
                return Err(REFUSED);
            }
            let cmd = if rht_only {
                MEASURE_SINGLE_SHOT_RHT_ONLY
            } else {
                MEASURE_SINGLE_SHOT
            };
            self.write_command(cmd)?;
            self.mode = SensorMode::SingleShotPending;
            self.rht_only = rht_only;
            debug!("SCD4x: single shot armed (rht_only={})", rht_only);
        } else if start {
            if self.mode != SensorMode::Idle {
                return Err(REFUSED);
            }
            self.write_command(START_PERIODIC)?;
            self.mode = SensorMode::PeriodicRunning;
            self.rht_only = false;
            debug!("SCD4x: periodic measurement started");
        } else {
            self.write_command(STOP_PERIODIC)?;
            self.mode = SensorMode::Idle;
            self.rht_only = false;
            debug!("SCD4x: measurement stopped");
        }
        Ok(())
    }

    /// Non-blocking poll of the device's data-ready flag.
    pub fn is_data_ready(&mut self) -> Result<bool, SensorError> {
        let [status] = self.read_words::<1>(GET_DATA_READY)?;
        Ok(status & 0x07FF != 0)
    }

    /// Read one sample.  Fails with [`SensorError::NotReady`] unless the
    /// device reports data ready.
    pub fn get_measurement(&mut self) -> Result<MeasurementSample, SensorError> {
        if !self.is_data_ready()? {
            return Err(SensorError::NotReady);
        }
        let [co2, t, rh] = self.read_words::<3>(READ_MEASUREMENT)?;
        if self.mode == SensorMode::SingleShotPending {
            self.mode = SensorMode::Idle;
            self.rht_only = false;
        }
        Ok(MeasurementSample::from_raw(co2, t, rh))
    }

    /// Minimum wait (ms) before a sample is ready in the current mode.
    pub fn conversion_cycle_time(&self) -> u32 {
        self.timing.for_mode(self.mode, self.rht_only)
    }

    pub fn timing(&self) -> CycleTiming {
        self.timing
    }

    // ── Configuration (device accepts these only while idle) ─

    /// Temperature offset (°C) applied by the device's compensation.
    pub fn temperature_offset(&mut self) -> Result<f32, SensorError> {
        let [raw] = self.read_words::<1>(GET_TEMPERATURE_OFFSET)?;
        Ok(f32::from(raw) * 175.0 / 65535.0)
    }

    /// Set the compensation offset.  Values outside 0–175 °C are rejected
    /// with [`SensorError::OutOfRange`] before any bus traffic.
    pub fn set_temperature_offset(&mut self, offset_c: f32) -> Result<(), SensorError> {
        if !(0.0..=MAX_TEMPERATURE_OFFSET_C).contains(&offset_c) {
            return Err(SensorError::OutOfRange);
        }
        let raw = (offset_c * 65535.0 / MAX_TEMPERATURE_OFFSET_C).round() as u16;
        self.write_command_with_word(SET_TEMPERATURE_OFFSET, raw)
    }

    /// Installation altitude in metres above sea level.
    pub fn altitude(&mut self) -> Result<u16, SensorError> {
        let [masl] = self.read_words::<1>(GET_ALTITUDE)?;
        Ok(masl)
    }

    pub fn set_altitude(&mut self, masl: u16) -> Result<(), SensorError> {
        self.write_command_with_word(SET_ALTITUDE, masl)
    }

    /// 48-bit factory serial number.
    pub fn serial_number(&mut self) -> Result<u64, SensorError> {
        let [w0, w1, w2] = self.read_words::<3>(GET_SERIAL_NUMBER)?;
        Ok((u64::from(w0) << 32) | (u64::from(w1) << 16) | u64::from(w2))
    }

    /// Whether automatic self-calibration is enabled.
    pub fn automatic_self_calibration(&mut self) -> Result<bool, SensorError> {
        let [asc] = self.read_words::<1>(GET_ASC_ENABLED)?;
        Ok(asc != 0)
    }

    // ── Housekeeping ─────────────────────────────────────────

    /// Block for `ms` on the driver's delay.
    pub fn wait_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Forget the tracked mode after a failed stop.  The device drops back
    /// to idle on its own once a single shot completes.
    pub(crate) fn reset_mode(&mut self) {
        if self.mode != SensorMode::Idle {
            info!("SCD4x: tracked mode {:?} reset to Idle", self.mode);
        }
        self.mode = SensorMode::Idle;
        self.rht_only = false;
    }

    // ── Bus primitives ───────────────────────────────────────

    fn write_command(&mut self, cmd: Command) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &cmd.code.to_be_bytes())
            .map_err(bus_error)?;
        if cmd.exec_ms > 0 {
            self.delay.delay_ms(cmd.exec_ms);
        }
        Ok(())
    }

    fn write_command_with_word(&mut self, cmd: Command, word: u16) -> Result<(), SensorError> {
        let [c0, c1] = cmd.code.to_be_bytes();
        let [w0, w1, crc] = encode_word(word);
        self.i2c
            .write(self.address, &[c0, c1, w0, w1, crc])
            .map_err(bus_error)?;
        self.delay.delay_ms(cmd.exec_ms);
        Ok(())
    }

    fn read_words<const N: usize>(&mut self, cmd: Command) -> Result<[u16; N], SensorError> {
        debug_assert!(N <= MAX_READ_WORDS);
        self.write_command(cmd)?;
        let mut buf = [0u8; MAX_READ_WORDS * 3];
        let buf = &mut buf[..N * 3];
        self.i2c.read(self.address, buf).map_err(bus_error)?;
        let mut words = [0u16; N];
        decode_words(buf, &mut words)?;
        Ok(words)
    }
}
