//! 16x2 character LCD (HD44780) behind a PCF8574 I2C backpack.
//!
//! Implements [`DisplayPort`].  The controller runs in 4-bit mode; every
//! byte goes out as two nibbles, each latched by pulsing EN on the
//! expander:
//!
//! ```text
//!   PCF8574 bit:  7  6  5  4 | 3   2   1   0
//!                 D7 D6 D5 D4 | BL  EN  RW  RS
//! ```
//!
//! The display is write-only from the firmware's point of view, so bus
//! faults are logged and otherwise ignored.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use log::{debug, info};

use crate::app::ports::DisplayPort;

/// Usual backpack address with A0..A2 pulled high.
pub const DEFAULT_ADDRESS: u8 = 0x27;

pub const COLS: u8 = 16;
pub const ROWS: u8 = 2;

const RS: u8 = 0x01;
const EN: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE_INC: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

/// DDRAM address of the first column on each row.
const ROW_OFFSETS: [u8; 2] = [0x00, 0x40];

/// Map a char onto the HD44780 A00 character ROM.
fn rom_code(c: char) -> u8 {
    match c {
        '°' => 0xDF,
        ' '..='}' => c as u8,
        _ => b'?',
    }
}

pub struct Lcd1602<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    backlight: u8,
    col: u8,
    row: u8,
    last_error: Option<ErrorKind>,
}

impl<I2C: I2c, D: DelayNs> Lcd1602<I2C, D> {
    /// Run the 4-bit initialisation sequence and clear the screen.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Result<Self, ErrorKind> {
        let mut lcd = Self {
            i2c,
            delay,
            address,
            backlight: BACKLIGHT,
            col: 0,
            row: 0,
            last_error: None,
        };
        lcd.expander_write(0).map_err(|e| e.kind())?;
        lcd.delay.delay_ms(50);
        // Force 8-bit mode three times, then drop to 4-bit.
        for wait_us in [4_500, 150, 150] {
            lcd.write_nibble(0x30, 0);
            lcd.delay.delay_us(wait_us);
        }
        lcd.write_nibble(0x20, 0);
        lcd.command(CMD_FUNCTION_4BIT_2LINE);
        lcd.command(CMD_DISPLAY_ON);
        lcd.command(CMD_ENTRY_MODE_INC);
        lcd.clear();
        if let Some(e) = lcd.last_error.take() {
            return Err(e);
        }
        info!("LCD1602: ready at 0x{:02x}", address);
        Ok(lcd)
    }

    pub fn set_backlight(&mut self, on: bool) {
        self.backlight = if on { BACKLIGHT } else { 0 };
        let _ = self.expander_write(0);
    }

    /// Most recent bus fault, cleared on read.
    pub fn take_error(&mut self) -> Option<ErrorKind> {
        self.last_error.take()
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn expander_write(&mut self, bits: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[bits | self.backlight])
    }

    /// Latch the upper nibble of `data` with register-select `mode`.
    fn write_nibble(&mut self, data: u8, mode: u8) {
        let bits = (data & 0xF0) | mode;
        let result = self
            .expander_write(bits | EN)
            .and_then(|()| self.expander_write(bits));
        if let Err(e) = result {
            debug!("LCD1602: bus error {:?}", e.kind());
            self.last_error = Some(e.kind());
        }
        self.delay.delay_us(1);
    }

    fn send(&mut self, byte: u8, mode: u8) {
        self.write_nibble(byte & 0xF0, mode);
        self.write_nibble(byte << 4, mode);
        self.delay.delay_us(50);
    }

    fn command(&mut self, cmd: u8) {
        self.send(cmd, 0);
    }
}

impl<I2C: I2c, D: DelayNs> DisplayPort for Lcd1602<I2C, D> {
    fn clear(&mut self) {
        self.command(CMD_CLEAR);
        self.delay.delay_ms(2);
        self.col = 0;
        self.row = 0;
    }

    fn move_to(&mut self, col: u8, row: u8) {
        self.col = col.min(COLS - 1);
        self.row = row.min(ROWS - 1);
        self.command(CMD_SET_DDRAM | (ROW_OFFSETS[self.row as usize] + self.col));
    }

    fn put_str(&mut self, s: &str) {
        for c in s.chars() {
            if c == '\n' || self.col >= COLS {
                let next = (self.row + 1) % ROWS;
                self.move_to(0, next);
                if c == '\n' {
                    continue;
                }
            }
            self.send(rom_code(c), RS);
            self.col += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::time::ClockAdapter;
    use embedded_hal::i2c::{ErrorType, Operation};

    #[derive(Default)]
    struct Recorder {
        writes: Vec<u8>,
    }

    impl ErrorType for Recorder {
        type Error = ErrorKind;
    }

    impl I2c for Recorder {
        fn transaction(&mut self, address: u8, ops: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
            assert_eq!(address, DEFAULT_ADDRESS);
            for op in ops {
                if let Operation::Write(bytes) = op {
                    self.writes.extend_from_slice(bytes);
                }
            }
            Ok(())
        }
    }

    fn lcd() -> Lcd1602<Recorder, ClockAdapter> {
        let mut lcd = Lcd1602::new(Recorder::default(), ClockAdapter::new(), DEFAULT_ADDRESS).unwrap();
        lcd.i2c.writes.clear();
        lcd
    }

    /// Expander bytes for one data byte: high nibble then low, each with EN pulsed.
    fn data_bytes(b: u8) -> [u8; 4] {
        let hi = (b & 0xF0) | RS | BACKLIGHT;
        let lo = (b << 4) | RS | BACKLIGHT;
        [hi | EN, hi, lo | EN, lo]
    }

    #[test]
    fn character_is_sent_as_two_latched_nibbles() {
        let mut lcd = lcd();
        lcd.put_str("A");
        assert_eq!(lcd.i2c.writes, data_bytes(b'A'));
        assert_eq!(data_bytes(b'A'), [0x4D, 0x49, 0x1D, 0x19]);
    }

    #[test]
    fn degree_sign_maps_to_rom() {
        let mut lcd = lcd();
        lcd.put_str("°");
        assert_eq!(lcd.i2c.writes, data_bytes(0xDF));
    }

    #[test]
    fn move_to_second_row_addresses_0x40() {
        let mut lcd = lcd();
        lcd.move_to(3, 1);
        let cmd = CMD_SET_DDRAM | 0x43;
        let hi = (cmd & 0xF0) | BACKLIGHT;
        let lo = (cmd << 4) | BACKLIGHT;
        assert_eq!(lcd.i2c.writes, [hi | EN, hi, lo | EN, lo]);
    }

    #[test]
    fn long_line_wraps_to_next_row() {
        let mut lcd = lcd();
        lcd.put_str("0123456789abcdefX");
        assert_eq!((lcd.col, lcd.row), (1, 1));
    }
}
