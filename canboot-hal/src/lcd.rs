//! HD44780 character display in 4-bit mode.

use canboot_shared::menu::Display;

use crate::{
    gpio::Pin,
    util::{delay_ms, delay_us},
};

/// Display wiring.
#[derive(Clone, Copy, Debug, defmt::Format)]
pub struct LcdPins {
    /// Register select (low: command, high: data).
    pub rs: Pin,
    /// Enable strobe.
    pub en: Pin,
    pub d4: Pin,
    pub d5: Pin,
    pub d6: Pin,
    pub d7: Pin,
}

const CLEAR: u8 = 0x01;
const ENTRY_MODE_INCREMENT: u8 = 0x06;
const DISPLAY_OFF: u8 = 0x08;
const DISPLAY_ON: u8 = 0x0c;
const FUNCTION_8BIT: u8 = 0x30;
const FUNCTION_4BIT: u8 = 0x20;
const FUNCTION_4BIT_2LINES: u8 = 0x28;
const ROW0: u8 = 0x80;
const ROW1: u8 = 0xc0;

/// Enable pulse width in microseconds.
const STROBE_US: u32 = 20;

/// HD44780 display.
pub struct Lcd {
    pins: LcdPins,
}

impl Lcd {
    /// Configures the pins and runs the 4-bit initialization sequence.
    pub fn new(pins: LcdPins) -> Self {
        for pin in [pins.rs, pins.en, pins.d4, pins.d5, pins.d6, pins.d7] {
            pin.into_push_pull_output(false);
        }

        let mut this = Self { pins };
        this.init();
        this
    }

    fn init(&mut self) {
        delay_ms(50);
        self.nibble(FUNCTION_8BIT >> 4, false);
        delay_ms(5);
        self.nibble(FUNCTION_8BIT >> 4, false);
        delay_ms(1);
        self.nibble(FUNCTION_8BIT >> 4, false);
        delay_ms(10);
        self.nibble(FUNCTION_4BIT >> 4, false);
        delay_ms(10);

        for (cmd, ms) in [
            (FUNCTION_4BIT_2LINES, 1),
            (DISPLAY_OFF, 1),
            (CLEAR, 2),
            (ENTRY_MODE_INCREMENT, 1),
            (DISPLAY_ON, 0),
        ] {
            self.command(cmd);
            delay_ms(ms);
        }

        defmt::debug!("display initialized");
    }

    fn nibble(&mut self, value: u8, data: bool) {
        let p = &self.pins;
        p.d7.set(value & 0b1000 != 0);
        p.d6.set(value & 0b0100 != 0);
        p.d5.set(value & 0b0010 != 0);
        p.d4.set(value & 0b0001 != 0);
        p.rs.set(data);

        p.en.set(true);
        delay_us(STROBE_US);
        p.en.set(false);
        delay_us(STROBE_US);
    }

    fn byte(&mut self, value: u8, data: bool) {
        self.nibble(value >> 4, data);
        self.nibble(value & 0x0f, data);
    }

    /// Sends a command byte.
    pub fn command(&mut self, cmd: u8) {
        self.byte(cmd, false);
    }

    /// Sends a character.
    pub fn write_char(&mut self, ch: u8) {
        self.byte(ch, true);
    }
}

impl Display for Lcd {
    fn clear(&mut self) {
        self.command(CLEAR);
        delay_ms(2);
    }

    fn move_cursor(&mut self, row: u8, col: u8) {
        let base = if row == 0 { ROW0 } else { ROW1 };
        self.command(base | (col & 0x3f));
    }

    fn write_str(&mut self, s: &str) {
        for ch in s.bytes() {
            self.write_char(ch);
        }
    }
}
