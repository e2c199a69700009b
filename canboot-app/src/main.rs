//
// CANboot firmware update over CAN for STM32F1 controllers
// Copyright (C) 2026 CANboot developers
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//

//! CANboot demo firmware.
//!
//! Linked at the firmware region and transferred by the sender.
//! Announces itself on the display and blinks the green LED.

#![no_std]
#![no_main]

// Logging provider.
#[cfg(feature = "defmt-rtt")]
use defmt_rtt as _;

use panic_probe as _;
use stm32f1 as _;

use cortex_m_rt::entry;

use canboot_hal::{
    board::Board,
    boards::Chosen as ThisBoard,
    cpu::relocate_vector_table,
    lcd::Lcd,
    led::{self, Led},
    util::delay_ms,
};
use canboot_shared::{layout::FIRMWARE, menu::Display};

/// Blink period of the green LED.
const BLINK_MS: u32 = 500;

/// Main entry point.
#[entry]
fn main() -> ! {
    relocate_vector_table(FIRMWARE.base);
    defmt::warn!("CANboot demo firmware version {}", env!("CARGO_PKG_VERSION"));

    led::init_all();

    let mut display = Lcd::new(ThisBoard::LCD);
    display.clear();
    display.move_cursor(0, 0);
    display.write_str("New Firmware");
    display.move_cursor(1, 0);
    display.write_str(env!("CARGO_PKG_VERSION"));

    loop {
        Led::Green.toggle();
        delay_ms(BLINK_MS);
    }
}
