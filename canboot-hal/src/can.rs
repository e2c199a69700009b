//! bxCAN controller.
//!
//! Only transmit mailboxes and receive FIFO 0 are used. Filter bank 0
//! restricts reception to a single standard identifier.

use core::convert::Infallible;

use canboot_shared::{
    bxcan::{exact_filter, identifier, pack_data, parse_identifier, unpack_data, Timing},
    frame::Frame,
    link::{Listener, Transmitter},
    poll::Patience,
};
use embedded_hal::can::{Frame as _, StandardId};
use stm32f1::stm32f103::{can1::RegisterBlock, Peripherals, CAN1};

use crate::gpio::{Mode, Pin, Port};

/// CAN transmit pin.
const TX_PIN: Pin = Pin::new(Port::A, 12);

/// CAN receive pin.
const RX_PIN: Pin = Pin::new(Port::A, 11);

/// Spins to wait for the controller to enter or leave initialization mode.
const MODE_CHANGE_PATIENCE: Patience = Patience::Spins(100_000);

fn regs() -> &'static RegisterBlock {
    unsafe { &*CAN1::ptr() }
}

/// CAN controller configuration.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Bit timing.
    pub timing: Timing,
    /// Automatic retransmission of frames that were not acknowledged.
    pub auto_retransmit: bool,
    /// Identifier of data frames to receive.
    pub accept: StandardId,
}

/// CAN initialization error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
pub enum InitError {
    /// Bit timing out of range.
    InvalidTiming,
    /// Controller did not enter initialization mode.
    EnterInit,
    /// Controller did not synchronize to the bus.
    LeaveInit,
}

/// bxCAN controller.
pub struct Can {
    tx: CanTx,
    rx: CanRx,
}

impl Can {
    /// Enables and configures the controller and its pins.
    ///
    /// Frame reception raises the FIFO 0 message pending interrupt.
    pub fn new(cfg: Config) -> Result<Self, InitError> {
        if !cfg.timing.is_valid() {
            return Err(InitError::InvalidTiming);
        }

        let dp = unsafe { Peripherals::steal() };
        dp.RCC.apb2enr.modify(|_, w| w.afioen().enabled().iopaen().enabled());
        dp.RCC.apb1enr.modify(|_, w| w.canen().set_bit());

        TX_PIN.configure(Mode::AlternatePushPull);
        RX_PIN.configure(Mode::InputPull);
        RX_PIN.set(true);

        let can = regs();
        can.mcr.modify(|_, w| w.sleep().clear_bit().inrq().set_bit());
        MODE_CHANGE_PATIENCE.wait_while(|| can.msr.read().inak().bit_is_clear()).map_err(|_| InitError::EnterInit)?;

        can.mcr.modify(|_, w| w.nart().bit(!cfg.auto_retransmit));
        can.btr.write(|w| unsafe { w.bits(cfg.timing.btr()) });

        let (value, mask) = exact_filter(cfg.accept);
        can.fmr.modify(|_, w| w.finit().set_bit());
        can.fa1r.modify(|_, w| w.fact0().clear_bit());
        can.fs1r.modify(|_, w| w.fsc0().set_bit());
        can.fm1r.modify(|_, w| w.fbm0().clear_bit());
        can.ffa1r.modify(|_, w| w.ffa0().clear_bit());
        can.fb[0].fr1.write(|w| unsafe { w.bits(value) });
        can.fb[0].fr2.write(|w| unsafe { w.bits(mask) });
        can.fa1r.modify(|_, w| w.fact0().set_bit());
        can.fmr.modify(|_, w| w.finit().clear_bit());

        can.ier.modify(|_, w| w.fmpie0().set_bit());

        can.mcr.modify(|_, w| w.inrq().clear_bit());
        MODE_CHANGE_PATIENCE.wait_while(|| can.msr.read().inak().bit_is_set()).map_err(|_| InitError::LeaveInit)?;

        defmt::info!(
            "CAN at {} bit/s, retransmit: {}, accepting 0x{:03x}",
            cfg.timing.bit_rate(crate::util::pclk1()),
            cfg.auto_retransmit,
            cfg.accept.as_raw()
        );

        Ok(Self { tx: CanTx { _private: () }, rx: CanRx { _private: () } })
    }

    /// Splits into transmit and receive halves.
    pub fn split(self) -> (CanTx, CanRx) {
        (self.tx, self.rx)
    }

    /// Receives a frame from FIFO 0.
    pub fn receive(&mut self) -> nb::Result<Frame, Infallible> {
        self.rx.receive()
    }
}

impl Transmitter for Can {
    type Error = Infallible;

    fn free_mailboxes(&self) -> usize {
        self.tx.free_mailboxes()
    }

    fn is_pending(&self) -> bool {
        self.tx.is_pending()
    }

    fn transmit(&mut self, frame: &Frame) -> nb::Result<(), Self::Error> {
        self.tx.transmit(frame)
    }
}

impl Listener for Can {
    fn stop_listening(&mut self) {
        self.rx.stop_listening()
    }
}

/// Transmitting half of the controller.
pub struct CanTx {
    _private: (),
}

impl CanTx {
    fn empty_mailboxes(&self) -> u32 {
        let tsr = regs().tsr.read();
        tsr.tme0().bit() as u32 | (tsr.tme1().bit() as u32) << 1 | (tsr.tme2().bit() as u32) << 2
    }
}

impl Transmitter for CanTx {
    type Error = Infallible;

    fn free_mailboxes(&self) -> usize {
        self.empty_mailboxes().count_ones() as usize
    }

    fn is_pending(&self) -> bool {
        self.empty_mailboxes() != 0b111
    }

    fn transmit(&mut self, frame: &Frame) -> nb::Result<(), Self::Error> {
        if self.empty_mailboxes() == 0 {
            return Err(nb::Error::WouldBlock);
        }

        let mailbox = &regs().tx[usize::from(regs().tsr.read().code().bits())];
        let (low, high) = pack_data(frame.data());
        mailbox.tir.write(|w| unsafe { w.bits(identifier(frame.id(), frame.is_remote_frame())) });
        mailbox.tdtr.write(|w| unsafe { w.dlc().bits(frame.dlc() as u8) });
        mailbox.tdlr.write(|w| unsafe { w.bits(low) });
        mailbox.tdhr.write(|w| unsafe { w.bits(high) });
        mailbox.tir.modify(|_, w| w.txrq().set_bit());

        Ok(())
    }
}

/// Receiving half of the controller.
pub struct CanRx {
    _private: (),
}

impl CanRx {
    /// Receives a frame from FIFO 0.
    pub fn receive(&mut self) -> nb::Result<Frame, Infallible> {
        let can = regs();
        let rf0r = can.rf0r.read();
        if rf0r.fmp0().bits() == 0 {
            return Err(nb::Error::WouldBlock);
        }
        let overrun = rf0r.fovr0().bit_is_set();
        if overrun {
            defmt::warn!("CAN receive FIFO overrun");
        }

        let fifo = &can.rx[0];
        let (id, remote) = parse_identifier(fifo.rir.read().bits());
        let dlc = usize::from(fifo.rdtr.read().dlc().bits()).min(8);
        let data = unpack_data(fifo.rdlr.read().bits(), fifo.rdhr.read().bits());
        can.rf0r.write(|w| w.rfom0().set_bit().fovr0().bit(overrun));

        let frame = if remote { Frame::new_remote(id, dlc) } else { Frame::new(id, &data[..dlc]) };
        match frame {
            Some(frame) => Ok(frame),
            None => Err(nb::Error::WouldBlock),
        }
    }
}

impl Listener for CanRx {
    fn stop_listening(&mut self) {
        regs().ier.modify(|_, w| w.fmpie0().clear_bit());
    }
}
