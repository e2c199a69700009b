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

//! CANboot Bootloader.
//!
//! Shows the boot menu and hands control to either the receiver,
//! which downloads new firmware over CAN, or the firmware itself.

#![no_std]
#![no_main]

// Logging provider.
#[cfg(feature = "defmt-rtt")]
use defmt_rtt as _;

use panic_probe as _;
use stm32f1 as _;

use cortex_m_rt::{entry, exception};

use canboot_hal::{
    board::Board,
    boards::Chosen as ThisBoard,
    buttons::PanelButtons,
    cpu::{self, CortexM},
    lcd::Lcd,
    led::{self, Led},
    util::Delay,
    BOARD_NAME,
};
use canboot_shared::{
    jump::{self, HandoffCpu},
    layout::{FIRMWARE, FIRMWARE_PROBE, PAGE_SIZE, RECEIVER},
    menu::BootMenu,
};

/// CANboot bootloader version.
pub static VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main entry point.
#[entry]
fn main() -> ! {
    let board = ThisBoard::new();

    defmt::warn!("CANboot bootloader version {}", VERSION);
    defmt::info!("board model:  {} ({})", board.model(), BOARD_NAME);
    defmt::info!("receiver:     0x{:08x} ({} pages)", RECEIVER.base, RECEIVER.pages());
    defmt::info!("firmware:     0x{:08x} ({} pages)", FIRMWARE.base, FIRMWARE.pages());
    defmt::info!("page size:    {} bytes", PAGE_SIZE);
    defmt::info!("");

    led::init_all();
    Led::Red.on();

    let mut display = Lcd::new(ThisBoard::LCD);
    let mut buttons = PanelButtons::new();
    let mut delay = Delay;

    BootMenu::greet(&mut display);

    let cpu = unsafe { CortexM::steal() };
    let target = BootMenu::new().run(&mut display, &mut buttons, &mut delay, || cpu.read_word(FIRMWARE_PROBE));
    defmt::info!("selected {}", target);

    Led::Red.off();
    jump::jump(cpu, target.base())
}

/// Grants privileged thread mode for the handoff.
#[exception]
fn SVCall() {
    cpu::grant_privileged();
}
