//! Utility functions.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::{board::Board, boards::Chosen};

/// Approximately delay execution by specified amount of milliseconds.
pub fn delay_ms(ms: u32) {
    let cycles = ms * (Chosen::CPU_CLOCK / 1000);
    cortex_m::asm::delay(cycles)
}

/// Approximately delay execution by specified amount of microseconds.
pub fn delay_us(us: u32) {
    let cycles = us * (Chosen::CPU_CLOCK / 1_000_000);
    cortex_m::asm::delay(cycles.max(1))
}

/// Busy-waiting delay provider.
#[derive(Clone, Copy, Default)]
pub struct Delay;

impl DelayMs<u16> for Delay {
    fn delay_ms(&mut self, ms: u16) {
        delay_ms(ms.into())
    }
}

impl DelayMs<u32> for Delay {
    fn delay_ms(&mut self, ms: u32) {
        delay_ms(ms)
    }
}

impl DelayUs<u16> for Delay {
    fn delay_us(&mut self, us: u16) {
        delay_us(us.into())
    }
}

/// Clock of the APB1 peripherals, which runs undivided from the processor clock.
pub const fn pclk1() -> u32 {
    Chosen::CPU_CLOCK
}
