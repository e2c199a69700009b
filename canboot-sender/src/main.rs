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

//! CANboot Sender.
//!
//! Streams the embedded firmware image to the receiver, one chunk per
//! acknowledgment.

#![no_std]
#![no_main]

// Logging provider.
#[cfg(feature = "defmt-rtt")]
use defmt_rtt as _;

use panic_probe as _;

use canboot_shared::signal::AckFlag;

/// Firmware image to transfer.
static IMAGE: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/image.bin"));

/// Raised by the receive interrupt when the receiver acknowledged a chunk.
static ACK: AckFlag = AckFlag::new(true);

/// Chunks between toggles of the yellow LED.
const BLINK_CHUNKS: usize = 32;

/// CANboot sender version.
pub static VERSION: &str = env!("CARGO_PKG_VERSION");

#[rtic::app(device = stm32f1::stm32f103, peripherals = true)]
mod app {
    use super::*;

    use canboot_hal::{
        board::Board,
        boards::Chosen as ThisBoard,
        can::{Can, CanRx, CanTx, Config},
        fault,
        led::{self, Led},
    };
    use canboot_shared::{
        frame::ACK_ID,
        layout::chunk_count,
        sender::{Progress, SendError, Sender},
    };

    /// Shared resources.
    #[shared]
    struct Shared {}

    /// Exclusive resources.
    #[local]
    struct Local {
        /// Transmitting half of the CAN controller.
        tx: CanTx,
        /// Receiving half of the CAN controller.
        rx: CanRx,
    }

    /// Initialization (entry point).
    #[init]
    fn init(_cx: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::warn!("CANboot sender version {}", VERSION);
        defmt::info!("image size:   {} bytes ({} chunks)", IMAGE.len(), chunk_count(IMAGE.len()));

        led::init_all();

        let cfg = Config { timing: ThisBoard::CAN_TIMING, auto_retransmit: true, accept: ACK_ID };
        let (tx, rx) = match Can::new(cfg) {
            Ok(can) => can.split(),
            Err(err) => {
                defmt::error!("cannot initialize CAN: {}", err);
                fault::halt("CAN init failed");
            }
        };

        (Shared {}, Local { tx, rx }, init::Monotonics())
    }

    /// Sends the image.
    #[idle(local = [tx])]
    fn idle(cx: idle::Context) -> ! {
        Led::Yellow.on();

        let mut sender = Sender::new(IMAGE, &ACK);
        let res = sender.run(cx.local.tx, |progress| {
            if let Progress::Sent { index } = progress {
                if index % BLINK_CHUNKS == 0 {
                    Led::Yellow.toggle();
                }
            }
        });

        Led::Yellow.off();
        match res {
            Ok(()) => {
                defmt::info!("transfer complete");
                Led::Blue.on();
            }
            Err(SendError::Link(err)) => match err {},
            Err(SendError::AckTimeout) => fault::halt("no acknowledgment"),
            Err(SendError::PendingTimeout) => fault::halt("transmission stuck"),
        }

        loop {
            cortex_m::asm::wfi();
        }
    }

    /// Handles acknowledgments from the receiver.
    #[task(binds = USB_LP_CAN_RX0, local = [rx])]
    fn can_rx(cx: can_rx::Context) {
        while let Ok(frame) = cx.local.rx.receive() {
            if frame.is_ack() {
                Led::Green.toggle();
                ACK.raise();
            } else {
                defmt::debug!("unexpected {}", frame);
            }
        }
    }
}
