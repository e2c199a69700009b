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

//! CANboot device drivers.
//!
//! Implements the hardware traits of `canboot-shared` for the STM32F103
//! and provides the board peripherals of the bootloader, receiver and
//! sender nodes.

#![no_std]

pub mod board;
pub mod boards;
pub mod buttons;
pub mod can;
pub mod cpu;
pub mod fault;
pub mod flash;
pub mod gpio;
pub mod lcd;
pub mod led;
pub mod util;

/// Name of the board selected at build time.
pub const BOARD_NAME: &str = env!("CANBOOT_BOARD_NAME");
