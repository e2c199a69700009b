//! Control transfer between images on the Cortex-M3.

use core::{arch::asm, ptr};

use canboot_shared::jump::HandoffCpu;
use cortex_m::{
    peripheral::{scb::Exception, SCB},
    register::{
        control::{self, Npriv, Spsel},
        msp, psp,
    },
};

/// Processor core of the running device.
pub struct CortexM {
    cp: cortex_m::Peripherals,
}

impl CortexM {
    /// Takes the core peripherals.
    ///
    /// # Safety
    /// Meant for the final handoff; other users of the core peripherals
    /// must not run afterwards.
    pub unsafe fn steal() -> Self {
        Self { cp: cortex_m::Peripherals::steal() }
    }
}

impl HandoffCpu for CortexM {
    fn is_privileged(&self) -> bool {
        control::read().npriv() == Npriv::Privileged
    }

    fn request_privileged(&mut self) {
        unsafe { asm!("svc 0") };
    }

    fn mask_interrupts(&mut self) {
        for icer in self.cp.NVIC.icer.iter() {
            unsafe { icer.write(0xffffffff) };
        }
        for icpr in self.cp.NVIC.icpr.iter() {
            unsafe { icpr.write(0xffffffff) };
        }
    }

    fn stop_systick(&mut self) {
        self.cp.SYST.disable_interrupt();
        self.cp.SYST.disable_counter();
        SCB::clear_pendst();
    }

    fn disable_fault_handlers(&mut self) {
        self.cp.SCB.disable(Exception::UsageFault);
        self.cp.SCB.disable(Exception::BusFault);
        self.cp.SCB.disable(Exception::MemoryManagement);
    }

    fn is_process_stack_active(&self) -> bool {
        control::read().spsel() == Spsel::Psp
    }

    #[allow(deprecated)]
    fn activate_main_stack(&mut self) {
        unsafe { msp::write(psp::read()) };
        let mut ctrl = control::read();
        ctrl.set_spsel(Spsel::Msp);
        unsafe { control::write(ctrl) };
    }

    fn set_vector_table(&mut self, base: u32) {
        unsafe { self.cp.SCB.vtor.write(base) };
    }

    fn enable_interrupts(&mut self) {
        unsafe { cortex_m::interrupt::enable() };
    }

    fn read_word(&self, addr: usize) -> u32 {
        unsafe { ptr::read_volatile(addr as *const u32) }
    }

    unsafe fn bootstrap(&mut self, stack_pointer: u32, entry: u32) -> ! {
        cortex_m::asm::bootstrap(stack_pointer as *const u32, entry as *const u32)
    }
}

/// Switches thread mode to privileged execution.
///
/// Called from the supervisor call handler.
pub fn grant_privileged() {
    let mut ctrl = control::read();
    ctrl.set_npriv(Npriv::Privileged);
    unsafe { control::write(ctrl) };
}

/// Points the vector table to the image at `base`.
///
/// Used by images that are linked behind the bootloader.
pub fn relocate_vector_table(base: usize) {
    let cp = unsafe { cortex_m::Peripherals::steal() };
    unsafe { cp.SCB.vtor.write(base as u32) };
}
