//! Simulated flash controller for host tests.

#![allow(dead_code)]

use std::{cell::Cell, collections::HashMap};

use canboot_shared::{
    fpec::{Control, FlashRegs, Latency, Status, KEY1, KEY2},
    layout::{FLASH_SIZE, FLASH_START, PAGE_SIZE},
};

/// A register access of the simulated controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Latency(Latency),
    Key(u32),
    ClearStatus(Status),
    Control(Control),
    Address(u32),
    Store(usize, u16),
}

/// Flash memory and controller registers.
///
/// Erase and program behave like the STM32F1 FPEC: programming requires
/// an erased half-word (or zero), protected pages raise `WRPRTERR`, and a
/// wrong key locks the controller until reset.
pub struct SimFlash {
    mem: Vec<u8>,
    other: HashMap<usize, u32>,
    cr: Control,
    sr: Cell<Status>,
    ar: u32,
    key_state: u8,
    keys_rejected: bool,
    busy_polls: u32,
    busy_left: Cell<u32>,
    stuck: bool,
    protected: Vec<usize>,
    erased: Vec<usize>,
    log: Vec<Access>,
}

impl SimFlash {
    /// Locked controller with erased flash.
    pub fn new() -> Self {
        Self {
            mem: vec![0xff; FLASH_SIZE],
            other: HashMap::new(),
            cr: Control::LOCK,
            sr: Cell::new(Status::default()),
            ar: 0,
            key_state: 0,
            keys_rejected: false,
            busy_polls: 0,
            busy_left: Cell::new(0),
            stuck: false,
            protected: Vec::new(),
            erased: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Ignore all unlock keys.
    pub fn reject_keys(&mut self) {
        self.keys_rejected = true;
    }

    /// Report busy for this many status reads after each operation.
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Report busy forever.
    pub fn stick_busy(&mut self) {
        self.stuck = true;
    }

    /// Write protect the page containing `addr`.
    pub fn protect(&mut self, addr: usize) {
        self.protected.push(addr / PAGE_SIZE * PAGE_SIZE);
    }

    /// Preloads flash memory, bypassing the controller.
    pub fn fill(&mut self, addr: usize, data: &[u8]) {
        let offset = addr - FLASH_START;
        self.mem[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Preloads a word outside of flash memory.
    pub fn poke(&mut self, addr: usize, value: u32) {
        self.other.insert(addr, value);
    }

    /// Flash memory content.
    pub fn memory(&self, addr: usize, len: usize) -> &[u8] {
        let offset = addr - FLASH_START;
        &self.mem[offset..offset + len]
    }

    /// All register accesses so far.
    pub fn accesses(&self) -> &[Access] {
        &self.log
    }

    /// All register writes so far, excluding key and latency writes.
    pub fn writes(&self) -> Vec<Access> {
        self.log.iter().copied().filter(|a| !matches!(a, Access::Key(_) | Access::Latency(_))).collect()
    }

    /// Number of half-words stored.
    pub fn stores(&self) -> usize {
        self.log.iter().filter(|a| matches!(a, Access::Store(..))).count()
    }

    /// Base addresses of erased pages in order of erasure.
    pub fn erased_pages(&self) -> &[usize] {
        &self.erased
    }

    /// Forgets recorded accesses and erasures.
    pub fn clear_log(&mut self) {
        self.log.clear();
        self.erased.clear();
    }

    fn raise(&self, flags: Status) {
        self.sr.set(Status(self.sr.get().0 | flags.0));
    }

    fn start_busy(&self) {
        self.busy_left.set(self.busy_polls);
    }

    fn is_protected(&self, addr: usize) -> bool {
        self.protected.contains(&(addr / PAGE_SIZE * PAGE_SIZE))
    }

    fn in_flash(addr: usize) -> bool {
        (FLASH_START..FLASH_START + FLASH_SIZE).contains(&addr)
    }
}

impl FlashRegs for SimFlash {
    fn set_latency(&mut self, latency: Latency) {
        self.log.push(Access::Latency(latency));
    }

    fn write_key(&mut self, key: u32) {
        self.log.push(Access::Key(key));
        if self.keys_rejected {
            return;
        }
        match (self.key_state, key) {
            (0, KEY1) => self.key_state = 1,
            (1, KEY2) => {
                self.key_state = 0;
                self.cr = self.cr.without(Control::LOCK);
            }
            _ => self.keys_rejected = true,
        }
    }

    fn status(&self) -> Status {
        let mut sr = self.sr.get();
        if self.stuck {
            sr = Status(sr.0 | Status::BSY.0);
        } else if self.busy_left.get() > 0 {
            self.busy_left.set(self.busy_left.get() - 1);
            sr = Status(sr.0 | Status::BSY.0);
        }
        sr
    }

    fn clear_status(&mut self, flags: Status) {
        self.log.push(Access::ClearStatus(flags));
        let sr = self.sr.get();
        self.sr.set(Status(sr.0 & !(flags.0 & Status::FLAGS.0)));
    }

    fn control(&self) -> Control {
        self.cr
    }

    fn set_control(&mut self, control: Control) {
        self.log.push(Access::Control(control));
        if self.cr.is_locked() {
            return;
        }
        if control.is_locked() {
            self.cr = Control::LOCK;
            return;
        }

        if control.contains(Control::STRT) && control.contains(Control::PER) {
            let page = self.ar as usize / PAGE_SIZE * PAGE_SIZE;
            if self.is_protected(page) {
                self.raise(Status::WRPRTERR);
            } else if Self::in_flash(page) {
                let offset = page - FLASH_START;
                self.mem[offset..offset + PAGE_SIZE].fill(0xff);
                self.erased.push(page);
                self.raise(Status::EOP);
            }
            self.start_busy();
        }

        self.cr = control.without(Control::STRT);
    }

    fn set_address(&mut self, addr: u32) {
        self.log.push(Access::Address(addr));
        self.ar = addr;
    }

    fn store(&mut self, addr: usize, value: u16) {
        self.log.push(Access::Store(addr, value));
        if self.cr.is_locked() || !self.cr.contains(Control::PG) || !Self::in_flash(addr) {
            return;
        }
        self.start_busy();
        if self.is_protected(addr) {
            self.raise(Status::WRPRTERR);
            return;
        }
        if self.load_half_word(addr) != 0xffff && value != 0 {
            self.raise(Status::PGERR);
            return;
        }
        let offset = addr - FLASH_START;
        self.mem[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        self.raise(Status::EOP);
    }

    fn load_half_word(&self, addr: usize) -> u16 {
        if Self::in_flash(addr) {
            let offset = addr - FLASH_START;
            u16::from_le_bytes([self.mem[offset], self.mem[offset + 1]])
        } else {
            let word = self.load_word(addr & !3);
            (word >> ((addr & 2) * 8)) as u16
        }
    }

    fn load_word(&self, addr: usize) -> u32 {
        if Self::in_flash(addr) {
            let offset = addr - FLASH_START;
            u32::from_le_bytes([self.mem[offset], self.mem[offset + 1], self.mem[offset + 2], self.mem[offset + 3]])
        } else {
            self.other.get(&addr).copied().unwrap_or_default()
        }
    }
}
