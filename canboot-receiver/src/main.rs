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

//! CANboot Receiver.
//!
//! Started by the bootloader. Reassembles the firmware image arriving
//! over CAN, writes it into the firmware region and resets the device.

#![no_std]
#![no_main]

// Logging provider.
#[cfg(feature = "defmt-rtt")]
use defmt_rtt as _;

use panic_probe as _;

use canboot_shared::layout::{chunk_count, CHUNK_SIZE};

include!(concat!(env!("OUT_DIR"), "/image_size.rs"));

/// Size of the reassembly buffer.
const BUFFER_SIZE: usize = chunk_count(IMAGE_SIZE) * CHUNK_SIZE;

/// CANboot receiver version.
pub static VERSION: &str = env!("CARGO_PKG_VERSION");

#[rtic::app(device = stm32f1::stm32f103, peripherals = true)]
mod app {
    use super::*;

    use cortex_m::peripheral::SCB;
    use heapless::spsc::{Consumer, Producer, Queue};

    use canboot_hal::{
        board::Board,
        boards::Chosen as ThisBoard,
        can::{Can, Config},
        cpu::relocate_vector_table,
        fault, flash,
        flash::PacFlash,
        led::{self, Led},
    };
    use canboot_shared::{
        fpec::Fpec,
        frame::DATA_ID,
        layout::{FIRMWARE, RECEIVER},
        receiver::{Image, Receiver, RxOutcome},
        updater::{UpdateOutcome, Updater},
    };

    /// Shared resources.
    #[shared]
    struct Shared {}

    /// Exclusive resources.
    #[local]
    struct Local {
        /// CAN controller.
        can: Can,
        /// Transfer state.
        receiver: Receiver<'static>,
        /// Hands the completed image to idle.
        completed_tx: Producer<'static, Image<'static>, 2>,
        /// Receives the completed image.
        completed_rx: Consumer<'static, Image<'static>, 2>,
        /// Flash controller.
        fpec: Fpec<PacFlash>,
    }

    /// Initialization (entry point).
    #[init(local = [
        buffer: [u8; BUFFER_SIZE] = [0; BUFFER_SIZE],
        completed: Queue<Image<'static>, 2> = Queue::new(),
    ])]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        relocate_vector_table(RECEIVER.base);

        defmt::warn!("CANboot receiver version {}", VERSION);
        defmt::info!("image size:   {} bytes ({} chunks)", IMAGE_SIZE, chunk_count(IMAGE_SIZE));
        defmt::info!("target:       0x{:08x}", FIRMWARE.base);

        led::init_all();
        Led::Green.on();

        let fpec = match unsafe { flash::unlock() } {
            Ok(fpec) => fpec,
            Err(err) => {
                defmt::error!("cannot unlock flash: {}", err);
                fault::halt("flash locked");
            }
        };

        let receiver = match Receiver::new(cx.local.buffer, IMAGE_SIZE) {
            Ok(receiver) => receiver,
            Err(err) => {
                defmt::error!("cannot create receiver: {}", err);
                fault::halt("bad image size");
            }
        };

        let cfg = Config { timing: ThisBoard::CAN_TIMING, auto_retransmit: false, accept: DATA_ID };
        let can = match Can::new(cfg) {
            Ok(can) => can,
            Err(err) => {
                defmt::error!("cannot initialize CAN: {}", err);
                fault::halt("CAN init failed");
            }
        };

        let (completed_tx, completed_rx) = cx.local.completed.split();

        defmt::info!("waiting for image");
        (Shared {}, Local { can, receiver, completed_tx, completed_rx, fpec }, init::Monotonics())
    }

    /// Flashes the completed image and restarts.
    #[idle(local = [completed_rx, fpec, updater: Updater = Updater::new(FIRMWARE)])]
    fn idle(cx: idle::Context) -> ! {
        let idle::LocalResources { completed_rx, fpec, updater } = cx.local;

        let image = loop {
            if let Some(image) = completed_rx.dequeue() {
                break image;
            }

            // A pending interrupt still ends the wait with interrupts masked.
            cortex_m::interrupt::free(|_| {
                if !completed_rx.ready() {
                    cortex_m::asm::wfi();
                }
            });
        };

        defmt::info!("received image of {} bytes", image.len());
        Led::Yellow.on();

        match updater.apply(fpec, &image) {
            Ok(UpdateOutcome::Flashed) => defmt::info!("firmware written to 0x{:08x}", FIRMWARE.base),
            Ok(UpdateOutcome::AlreadyFlashed) => defmt::warn!("firmware was already written"),
            Err(err) => {
                defmt::error!("flashing failed: {}", err);
                fault::halt("flashing failed");
            }
        }
        fpec.lock();

        Led::Yellow.off();
        defmt::info!("restarting");
        SCB::sys_reset();
    }

    /// Handles received CAN frames.
    #[task(binds = USB_LP_CAN_RX0, local = [can, receiver, completed_tx])]
    fn can_rx(cx: can_rx::Context) {
        let can_rx::LocalResources { can, receiver, completed_tx } = cx.local;

        while let Ok(frame) = can.receive() {
            Led::Blue.toggle();

            match receiver.on_frame(&frame, can) {
                Ok(RxOutcome::Accepted { index }) => defmt::trace!("chunk {}", index),
                Ok(RxOutcome::Complete(image)) => {
                    defmt::info!("transfer complete, {}", receiver.stats());
                    if completed_tx.enqueue(image).is_err() {
                        defmt::error!("completed image queue full");
                    }
                }
                Ok(RxOutcome::Rejected(_)) => (),
                Err(err) => match err {},
            }
        }
    }
}
