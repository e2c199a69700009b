//! Handoff from the bootloader to an independently linked image.
//!
//! The handoff runs as a fixed checklist. Each step is a precondition for
//! the next one and the last step never returns:
//!
//! 1. enter privileged mode, via supervisor call if necessary,
//! 2. mask and unpend every interrupt line,
//! 3. stop SysTick and unpend its exception,
//! 4. disable the usage, bus and memory management fault handlers,
//! 5. switch from the process stack to the main stack,
//! 6. point the vector table at the target image,
//! 7. load the stack pointer from the image header and branch to its entry.
//!
//! Interrupts stay globally enabled across the handoff. Step 2 masks the
//! lines at the interrupt controller only, and the target is entered with
//! PRIMASK cleared so it can use SysTick before configuring anything.

use crate::{
    layout::{self, ERASED_WORD, RAM_SIZE, RAM_START},
    log,
};

/// The first two words of an image: its vector table head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AppHeader {
    /// Initial main stack pointer.
    pub stack_pointer: u32,
    /// Reset handler address.
    pub entry: u32,
}

impl AppHeader {
    /// Reads the header of the image at `base`.
    pub fn read(base: usize, read_word: impl Fn(usize) -> u32) -> Self {
        Self { stack_pointer: read_word(base), entry: read_word(base + 4) }
    }

    /// Whether the header looks like a real image.
    ///
    /// The stack pointer must lie in RAM and the entry point must be a
    /// thumb address in flash. This is informational only; the bootloader
    /// jumps regardless.
    pub fn is_plausible(&self) -> bool {
        let sp = self.stack_pointer as usize;
        let entry = self.entry as usize;
        sp > RAM_START && sp <= RAM_START + RAM_SIZE && sp % 4 == 0 && entry & 1 == 1 && layout::is_flash(entry & !1)
    }
}

/// Whether firmware is present, judged by one probe word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Presence {
    /// Probe reads as erased flash.
    Absent,
    /// Probe holds the contained value.
    Present(u32),
}

impl Presence {
    /// Classifies a probe word.
    ///
    /// Any value except erased flash counts as present.
    pub const fn classify(word: u32) -> Self {
        if word == ERASED_WORD {
            Self::Absent
        } else {
            Self::Present(word)
        }
    }

    /// Whether firmware is present.
    pub const fn is_present(self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// Core registers and instructions needed for the handoff.
pub trait HandoffCpu {
    /// Whether thread mode runs privileged.
    fn is_privileged(&self) -> bool;

    /// Requests privileged thread mode through a supervisor call.
    fn request_privileged(&mut self);

    /// Disables and unpends all interrupt lines.
    fn mask_interrupts(&mut self);

    /// Disables SysTick and clears its pending exception.
    fn stop_systick(&mut self);

    /// Disables the usage, bus and memory management fault handlers.
    fn disable_fault_handlers(&mut self);

    /// Whether the process stack pointer is the active one.
    fn is_process_stack_active(&self) -> bool;

    /// Selects the main stack pointer and loads it with the process stack pointer.
    fn activate_main_stack(&mut self);

    /// Writes the vector table offset register.
    fn set_vector_table(&mut self, base: u32);

    /// Clears PRIMASK.
    fn enable_interrupts(&mut self);

    /// Volatile word load.
    fn read_word(&self, addr: usize) -> u32;

    /// Loads the stack pointer and branches to `entry`.
    ///
    /// # Safety
    /// `entry` must be the reset handler of a valid image and
    /// `stack_pointer` its initial stack pointer.
    unsafe fn bootstrap(&mut self, stack_pointer: u32, entry: u32) -> !;
}

/// A CPU that completed steps 1 to 6 of the handoff.
pub struct Prepared<C> {
    cpu: C,
    target: usize,
    header: AppHeader,
}

/// Performs steps 1 to 6 of the handoff to the image at `target`.
pub fn prepare<C: HandoffCpu>(mut cpu: C, target: usize) -> Prepared<C> {
    if !cpu.is_privileged() {
        cpu.request_privileged();
    }

    cpu.mask_interrupts();
    cpu.stop_systick();
    cpu.disable_fault_handlers();

    if cpu.is_process_stack_active() {
        cpu.activate_main_stack();
    }

    cpu.set_vector_table(target as u32);

    let header = AppHeader::read(target, |addr| cpu.read_word(addr));
    Prepared { cpu, target, header }
}

impl<C: HandoffCpu> Prepared<C> {
    /// Header of the target image.
    pub fn header(&self) -> AppHeader {
        self.header
    }

    /// Performs step 7: enters the target image.
    pub fn launch(mut self) -> ! {
        let AppHeader { stack_pointer, entry } = self.header;
        if !self.header.is_plausible() {
            log::warn!("image at 0x{:08x} has implausible header {}", self.target, self.header);
        }

        self.cpu.enable_interrupts();

        // SAFETY: the vector table points to the target and all interrupt lines are masked.
        unsafe { self.cpu.bootstrap(stack_pointer, entry) }
    }
}

/// Transfers control to the image at `target`.
pub fn jump<C: HandoffCpu>(cpu: C, target: usize) -> ! {
    log::info!("jumping to 0x{:08x}", target);
    prepare(cpu, target).launch()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::layout::{FIRMWARE, RECEIVER};
    use std::{
        cell::RefCell,
        collections::HashMap,
        panic::{catch_unwind, AssertUnwindSafe},
        rc::Rc,
    };

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Step {
        RequestPrivileged,
        MaskInterrupts,
        StopSysTick,
        DisableFaults,
        ActivateMainStack,
        VectorTable(u32),
        EnableInterrupts,
        Bootstrap { stack_pointer: u32, entry: u32 },
    }

    pub struct MockCpu {
        pub privileged: bool,
        pub process_stack: bool,
        pub interrupts_enabled: bool,
        pub memory: HashMap<usize, u32>,
        pub steps: Rc<RefCell<Vec<Step>>>,
    }

    impl MockCpu {
        pub fn new(steps: Rc<RefCell<Vec<Step>>>) -> Self {
            Self { privileged: true, process_stack: false, interrupts_enabled: true, memory: HashMap::new(), steps }
        }

        fn record(&self, step: Step) {
            self.steps.borrow_mut().push(step);
        }
    }

    impl HandoffCpu for MockCpu {
        fn is_privileged(&self) -> bool {
            self.privileged
        }

        fn request_privileged(&mut self) {
            self.record(Step::RequestPrivileged);
            self.privileged = true;
        }

        fn mask_interrupts(&mut self) {
            self.record(Step::MaskInterrupts);
        }

        fn stop_systick(&mut self) {
            self.record(Step::StopSysTick);
        }

        fn disable_fault_handlers(&mut self) {
            self.record(Step::DisableFaults);
        }

        fn is_process_stack_active(&self) -> bool {
            self.process_stack
        }

        fn activate_main_stack(&mut self) {
            self.record(Step::ActivateMainStack);
            self.process_stack = false;
        }

        fn set_vector_table(&mut self, base: u32) {
            self.record(Step::VectorTable(base));
        }

        fn enable_interrupts(&mut self) {
            self.record(Step::EnableInterrupts);
            self.interrupts_enabled = true;
        }

        fn read_word(&self, addr: usize) -> u32 {
            self.memory.get(&addr).copied().unwrap_or(ERASED_WORD)
        }

        unsafe fn bootstrap(&mut self, stack_pointer: u32, entry: u32) -> ! {
            assert!(self.interrupts_enabled, "entered image with interrupts disabled");
            self.record(Step::Bootstrap { stack_pointer, entry });
            panic!("left the bootloader");
        }
    }

    /// Runs `jump` and returns the recorded steps.
    pub fn run_jump(mut cpu: MockCpu, target: usize) -> Vec<Step> {
        let steps = cpu.steps.clone();
        cpu.steps.borrow_mut().clear();
        let res = catch_unwind(AssertUnwindSafe(move || jump(cpu, target)));
        assert!(res.is_err());
        let steps = steps.borrow().clone();
        steps
    }

    #[test]
    fn full_checklist_in_order() {
        let mut cpu = MockCpu::new(Rc::default());
        cpu.privileged = false;
        cpu.process_stack = true;
        cpu.memory.insert(FIRMWARE.base, 0x2000_5000);
        cpu.memory.insert(FIRMWARE.base + 4, 0x0800_dd01);

        let steps = run_jump(cpu, FIRMWARE.base);
        assert_eq!(
            steps,
            [
                Step::RequestPrivileged,
                Step::MaskInterrupts,
                Step::StopSysTick,
                Step::DisableFaults,
                Step::ActivateMainStack,
                Step::VectorTable(FIRMWARE.base as u32),
                Step::EnableInterrupts,
                Step::Bootstrap { stack_pointer: 0x2000_5000, entry: 0x0800_dd01 },
            ]
        );
    }

    #[test]
    fn privileged_main_stack_skips_switches() {
        let mut cpu = MockCpu::new(Rc::default());
        cpu.memory.insert(RECEIVER.base, 0x2000_4000);
        cpu.memory.insert(RECEIVER.base + 4, 0x0800_6531);

        let steps = run_jump(cpu, RECEIVER.base);
        assert_eq!(
            steps,
            [
                Step::MaskInterrupts,
                Step::StopSysTick,
                Step::DisableFaults,
                Step::VectorTable(RECEIVER.base as u32),
                Step::EnableInterrupts,
                Step::Bootstrap { stack_pointer: 0x2000_4000, entry: 0x0800_6531 },
            ]
        );
    }

    #[test]
    fn image_is_entered_with_interrupts_enabled() {
        let mut cpu = MockCpu::new(Rc::default());
        cpu.interrupts_enabled = false;
        cpu.memory.insert(FIRMWARE.base, 0x2000_5000);
        cpu.memory.insert(FIRMWARE.base + 4, 0x0800_dd01);

        let steps = run_jump(cpu, FIRMWARE.base);
        assert_eq!(
            steps[steps.len() - 2..],
            [Step::EnableInterrupts, Step::Bootstrap { stack_pointer: 0x2000_5000, entry: 0x0800_dd01 }]
        );
        assert_eq!(steps.iter().filter(|s| **s == Step::EnableInterrupts).count(), 1);
    }

    #[test]
    fn implausible_header_still_jumps() {
        let mut cpu = MockCpu::new(Rc::default());
        cpu.memory.insert(FIRMWARE.base, 0x1234_5678);
        cpu.memory.insert(FIRMWARE.base + 4, 0x0000_0000);

        let prepared = prepare(cpu, FIRMWARE.base);
        assert!(!prepared.header().is_plausible());
        let steps = prepared.cpu.steps.clone();
        assert!(catch_unwind(AssertUnwindSafe(move || prepared.launch())).is_err());
        assert_eq!(steps.borrow().last(), Some(&Step::Bootstrap { stack_pointer: 0x1234_5678, entry: 0 }));
    }

    #[test]
    fn presence_probe() {
        assert_eq!(Presence::classify(0xffff_ffff), Presence::Absent);
        assert_eq!(Presence::classify(0x2000_5000), Presence::Present(0x2000_5000));
        assert!(Presence::classify(0).is_present());
        assert!(Presence::classify(0xffff_fffe).is_present());
    }

    #[test]
    fn header_plausibility() {
        let ok = AppHeader { stack_pointer: 0x2000_5000, entry: 0x0800_dd01 };
        assert!(ok.is_plausible());
        assert!(!AppHeader { entry: 0x0800_dd00, ..ok }.is_plausible());
        assert!(!AppHeader { entry: 0x0000_0101, ..ok }.is_plausible());
        assert!(!AppHeader { stack_pointer: 0x2000_5004, ..ok }.is_plausible());
        assert!(!AppHeader { stack_pointer: 0x2000_4ffe, ..ok }.is_plausible());
        assert!(!AppHeader { stack_pointer: 0xffff_ffff, entry: 0xffff_ffff }.is_plausible());
    }
}
