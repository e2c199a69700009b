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

//! CANboot shared code.
//!
//! Everything in here is free of device access and used by the bootloader,
//! the receiver and the sender images. Hardware is reached through the
//! traits [`fpec::FlashRegs`], [`link::Transmitter`], [`link::Listener`]
//! and [`jump::HandoffCpu`], which the target crates implement.

#![cfg_attr(not(test), no_std)]

#[cfg(test)]
extern crate self as canboot_shared;

pub mod bxcan;
pub mod fpec;
pub mod frame;
pub mod jump;
pub mod layout;
pub mod link;
pub mod menu;
pub mod poll;
pub mod receiver;
pub mod sender;
pub mod signal;
pub mod updater;

#[cfg(test)]
pub(crate) mod sim;

#[cfg(feature = "defmt")]
pub(crate) use defmt as log;

#[cfg(not(feature = "defmt"))]
pub(crate) mod log {
    macro_rules! info {
        ($($x:tt)*) => {{}};
    }
    pub(crate) use info;
    macro_rules! debug {
        ($($x:tt)*) => {{}};
    }
    pub(crate) use debug;
    macro_rules! warner {
        ($($x:tt)*) => {{}};
    }
    pub(crate) use warner as warn;
    macro_rules! error {
        ($($x:tt)*) => {{}};
    }
    pub(crate) use error;
}
