//! Flash program/erase controller (FPEC) driver.
//!
//! All operations busy-poll the controller. By default they wait forever,
//! like the controller itself would; a [`Patience`] turns a stuck busy flag
//! into [`FlashError::Timeout`].

use crate::{
    layout::{self, ERASED_WORD, FLASH_END, FLASH_START, PAGE_COUNT, PAGE_SIZE},
    log,
    poll::Patience,
};

/// First key of the unlock sequence.
pub const KEY1: u32 = 0x4567_0123;

/// Second key of the unlock sequence.
pub const KEY2: u32 = 0xcdef_89ab;

/// Flash status register (`FLASH_SR`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u32);

impl Status {
    /// Operation in progress.
    pub const BSY: Self = Self(1 << 0);
    /// Programming error: target was not erased.
    pub const PGERR: Self = Self(1 << 2);
    /// Write protection error.
    pub const WRPRTERR: Self = Self(1 << 4);
    /// End of operation.
    pub const EOP: Self = Self(1 << 5);
    /// All write-one-to-clear flags.
    pub const FLAGS: Self = Self(Self::EOP.0 | Self::PGERR.0 | Self::WRPRTERR.0);

    /// Whether all bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Operation in progress.
    pub const fn is_busy(self) -> bool {
        self.contains(Self::BSY)
    }

    /// Programming error.
    pub const fn is_program_error(self) -> bool {
        self.contains(Self::PGERR)
    }

    /// Write protection error.
    pub const fn is_write_protect_error(self) -> bool {
        self.contains(Self::WRPRTERR)
    }

    /// End of operation.
    pub const fn is_end_of_operation(self) -> bool {
        self.contains(Self::EOP)
    }
}

/// Flash control register (`FLASH_CR`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Control(pub u32);

impl Control {
    /// Programming.
    pub const PG: Self = Self(1 << 0);
    /// Page erase.
    pub const PER: Self = Self(1 << 1);
    /// Mass erase.
    pub const MER: Self = Self(1 << 2);
    /// Start erase operation.
    pub const STRT: Self = Self(1 << 6);
    /// Controller locked.
    pub const LOCK: Self = Self(1 << 7);

    /// Whether all bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Copy with the bits of `other` set.
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Copy with the bits of `other` cleared.
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Controller locked.
    pub const fn is_locked(self) -> bool {
        self.contains(Self::LOCK)
    }
}

/// Flash wait states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Latency {
    /// Up to 24 MHz.
    Zero = 0,
    /// Up to 48 MHz.
    One = 1,
    /// Up to 72 MHz.
    Two = 2,
}

impl Latency {
    /// Wait states required for the specified core clock.
    pub const fn for_clock(hz: u32) -> Self {
        if hz <= 24_000_000 {
            Self::Zero
        } else if hz <= 48_000_000 {
            Self::One
        } else {
            Self::Two
        }
    }
}

/// Register-level access to the flash controller and flash memory.
pub trait FlashRegs {
    /// Programs the wait states into the access control register.
    fn set_latency(&mut self, latency: Latency);

    /// Writes the key register.
    fn write_key(&mut self, key: u32);

    /// Reads the status register.
    fn status(&self) -> Status;

    /// Writes one to the flags in `flags`, which clears them.
    fn clear_status(&mut self, flags: Status);

    /// Reads the control register.
    fn control(&self) -> Control;

    /// Writes the control register.
    fn set_control(&mut self, control: Control);

    /// Writes the address register.
    fn set_address(&mut self, addr: u32);

    /// Stores a half-word into flash memory.
    fn store(&mut self, addr: usize, value: u16);

    /// Volatile half-word load.
    fn load_half_word(&self, addr: usize) -> u16;

    /// Volatile word load.
    fn load_word(&self, addr: usize) -> u32;
}

/// Flash operation error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Page index beyond the last flash page.
    PageOutOfRange,
    /// Address outside of flash memory.
    AddressOutOfRange,
    /// Address not aligned as required.
    Misaligned,
    /// Controller is locked.
    ///
    /// A failed unlock can only be undone by a reset.
    Locked,
    /// Controller stayed busy.
    Timeout,
    /// Programming error: target was not erased.
    ProgramError,
    /// Target is write protected.
    WriteProtected,
    /// Flash content differs from what was written or erased.
    Verify {
        /// Address of first mismatch.
        address: usize,
    },
}

/// Flash program/erase controller.
pub struct Fpec<R> {
    regs: R,
    patience: Patience,
}

impl<R: FlashRegs> Fpec<R> {
    /// Creates a driver that waits forever on a busy controller.
    pub fn new(regs: R) -> Self {
        Self::with_patience(regs, Patience::Forever)
    }

    /// Creates a driver with bounded busy waits.
    pub fn with_patience(regs: R, patience: Patience) -> Self {
        Self { regs, patience }
    }

    /// Programs the wait states and unlocks the controller.
    ///
    /// Does nothing more if the controller is already unlocked.
    pub fn init(&mut self, latency: Latency) -> Result<(), FlashError> {
        self.regs.set_latency(latency);

        if self.regs.control().is_locked() {
            log::debug!("unlocking flash");
            self.regs.write_key(KEY1);
            self.regs.write_key(KEY2);

            if self.regs.control().is_locked() {
                log::error!("flash unlock failed");
                return Err(FlashError::Locked);
            }
        }

        Ok(())
    }

    /// Whether the controller is locked.
    pub fn is_locked(&self) -> bool {
        self.regs.control().is_locked()
    }

    /// Locks the controller until the next [`init`](Self::init).
    pub fn lock(&mut self) {
        let control = self.regs.control();
        self.regs.set_control(control.with(Control::LOCK));
    }

    /// Erases the page with the specified index.
    pub fn erase_page(&mut self, index: usize) -> Result<(), FlashError> {
        let addr = layout::page_address(index).ok_or(FlashError::PageOutOfRange)?;
        self.erase_at(addr)
    }

    /// Erases all pages from index `first` to `last` inclusive.
    pub fn erase_pages(&mut self, first: usize, last: usize) -> Result<(), FlashError> {
        if first > last || last >= PAGE_COUNT {
            return Err(FlashError::PageOutOfRange);
        }
        for index in first..=last {
            self.erase_page(index)?;
        }
        Ok(())
    }

    /// Erases all pages from the page at `start` to the page at `end` inclusive.
    ///
    /// Both addresses must be page aligned and within flash memory.
    pub fn erase_range(&mut self, start: usize, end: usize) -> Result<(), FlashError> {
        if !layout::is_flash(start) || !layout::is_flash(end) || start > end {
            return Err(FlashError::AddressOutOfRange);
        }
        if !layout::is_page_aligned(start) || !layout::is_page_aligned(end) {
            return Err(FlashError::Misaligned);
        }

        log::info!("erasing flash 0x{:08x} - 0x{:08x}", start, end + PAGE_SIZE);
        self.wait_idle()?;
        for addr in (start..=end).step_by(PAGE_SIZE) {
            self.erase_at(addr)?;
        }

        Ok(())
    }

    /// Programs the half-words `data` starting at `addr`.
    ///
    /// The target must have been erased.
    pub fn write(&mut self, addr: usize, data: &[u16]) -> Result<(), FlashError> {
        Self::check_write(addr, data.len() * 2)?;

        for (i, &value) in data.iter().enumerate() {
            self.program(addr + 2 * i, value)?;
        }

        Ok(())
    }

    /// Programs `data` starting at `addr`, two bytes at a time.
    ///
    /// A trailing odd byte is paired with `0xff`.
    pub fn write_bytes(&mut self, addr: usize, data: &[u8]) -> Result<(), FlashError> {
        Self::check_write(addr, data.len() + data.len() % 2)?;

        for (i, pair) in data.chunks(2).enumerate() {
            let value = u16::from_le_bytes([pair[0], pair.get(1).copied().unwrap_or(0xff)]);
            self.program(addr + 2 * i, value)?;
        }

        log::debug!("wrote {} bytes at 0x{:08x}", data.len(), addr);
        Ok(())
    }

    /// Reads the word at `addr`.
    ///
    /// Valid for any mapped address, including outside of flash.
    pub fn read_word(&self, addr: usize) -> u32 {
        self.regs.load_word(addr)
    }

    /// Reads the half-word at `addr`.
    pub fn read_half_word(&self, addr: usize) -> u16 {
        self.regs.load_half_word(addr)
    }

    /// Register access.
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Mutable register access.
    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Releases the register access.
    pub fn free(self) -> R {
        self.regs
    }

    fn check_write(addr: usize, len: usize) -> Result<(), FlashError> {
        if addr % 2 != 0 {
            return Err(FlashError::Misaligned);
        }
        if addr < FLASH_START || addr > FLASH_END || len > FLASH_END - addr {
            return Err(FlashError::AddressOutOfRange);
        }
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<(), FlashError> {
        if self.is_locked() {
            Err(FlashError::Locked)
        } else {
            Ok(())
        }
    }

    fn wait_idle(&self) -> Result<(), FlashError> {
        self.patience.wait_while(|| self.regs.status().is_busy()).map_err(|_| {
            log::error!("flash busy timeout");
            FlashError::Timeout
        })
    }

    fn clear_state(&mut self) {
        self.regs.clear_status(Status::FLAGS);
    }

    fn set_control_bits(&mut self, bits: Control) {
        let control = self.regs.control();
        self.regs.set_control(control.with(bits));
    }

    fn clear_control_bits(&mut self, bits: Control) {
        let control = self.regs.control();
        self.regs.set_control(control.without(bits));
    }

    /// Waits for the running operation and marks its end.
    fn finish(&mut self) -> Result<(), FlashError> {
        self.wait_idle()?;

        let status = self.regs.status();
        self.clear_state();

        if status.is_write_protect_error() {
            Err(FlashError::WriteProtected)
        } else if status.is_program_error() {
            Err(FlashError::ProgramError)
        } else {
            Ok(())
        }
    }

    fn erase_at(&mut self, addr: usize) -> Result<(), FlashError> {
        self.ensure_unlocked()?;
        self.wait_idle()?;
        self.clear_state();

        self.set_control_bits(Control::PER);
        self.regs.set_address(addr as u32);
        self.set_control_bits(Control::STRT);
        let res = self.finish();
        self.clear_control_bits(Control::PER);
        res?;

        for word in (addr..addr + PAGE_SIZE).step_by(4) {
            if self.regs.load_word(word) != ERASED_WORD {
                log::error!("page 0x{:08x} not erased at 0x{:08x}", addr, word);
                return Err(FlashError::Verify { address: word });
            }
        }

        log::debug!("erased page 0x{:08x}", addr);
        Ok(())
    }

    fn program(&mut self, addr: usize, value: u16) -> Result<(), FlashError> {
        self.ensure_unlocked()?;
        self.wait_idle()?;
        self.clear_state();

        self.set_control_bits(Control::PG);
        self.regs.store(addr, value);
        let res = self.finish();
        self.clear_control_bits(Control::PG);
        res?;

        if self.regs.load_half_word(addr) != value {
            log::error!("readback mismatch at 0x{:08x}", addr);
            return Err(FlashError::Verify { address: addr });
        }

        Ok(())
    }
}
