//! Flash program and erase controller registers.

use core::ptr;

use canboot_shared::fpec::{Control, FlashRegs, Fpec, Latency, Status};
use stm32f1::stm32f103::Peripherals;

use crate::{board::Board, boards::Chosen};

/// Flash controller of the running device.
pub struct PacFlash {
    dp: Peripherals,
}

impl PacFlash {
    /// Takes the flash controller.
    ///
    /// # Safety
    /// No other code may access the flash controller registers.
    pub unsafe fn steal() -> Self {
        Self { dp: Peripherals::steal() }
    }
}

impl FlashRegs for PacFlash {
    fn set_latency(&mut self, latency: Latency) {
        self.dp.FLASH.acr.modify(|r, w| unsafe { w.bits((r.bits() & !0b111) | latency as u32) });
    }

    fn write_key(&mut self, key: u32) {
        self.dp.FLASH.keyr.write(|w| unsafe { w.key().bits(key) });
        cortex_m::asm::nop();
    }

    fn status(&self) -> Status {
        Status(self.dp.FLASH.sr.read().bits())
    }

    fn clear_status(&mut self, flags: Status) {
        self.dp.FLASH.sr.write(|w| unsafe { w.bits(flags.0) });
        cortex_m::asm::nop();
    }

    fn control(&self) -> Control {
        Control(self.dp.FLASH.cr.read().bits())
    }

    fn set_control(&mut self, control: Control) {
        self.dp.FLASH.cr.write(|w| unsafe { w.bits(control.0) });
        cortex_m::asm::nop();
    }

    fn set_address(&mut self, addr: u32) {
        self.dp.FLASH.ar.write(|w| w.far().variant(addr));
    }

    fn store(&mut self, addr: usize, value: u16) {
        unsafe { ptr::write_volatile(addr as *mut u16, value) };
    }

    fn load_half_word(&self, addr: usize) -> u16 {
        unsafe { ptr::read_volatile(addr as *const u16) }
    }

    fn load_word(&self, addr: usize) -> u32 {
        unsafe { ptr::read_volatile(addr as *const u32) }
    }
}

/// Takes the flash controller and unlocks it.
///
/// # Safety
/// No other code may access the flash controller registers.
pub unsafe fn unlock() -> Result<Fpec<PacFlash>, canboot_shared::fpec::FlashError> {
    let mut fpec = Fpec::new(PacFlash::steal());
    fpec.init(Latency::for_clock(Chosen::CPU_CLOCK))?;
    Ok(fpec)
}
