//! Flash memory map.
//!
//! ```text
//! 0x0800_0000  bootloader       25 KiB
//! 0x0800_6400  receiver         30 KiB
//! 0x0800_DC00  new firmware     30 KiB
//! 0x0801_5400  unused
//! 0x0802_0000  end of flash
//! ```

/// Address of start of flash memory.
pub const FLASH_START: usize = 0x0800_0000;

/// Total flash size.
pub const FLASH_SIZE: usize = 128 * 1024;

/// Address of end of flash memory (exclusive).
pub const FLASH_END: usize = FLASH_START + FLASH_SIZE;

/// Flash page size.
pub const PAGE_SIZE: usize = 1024;

/// Number of flash pages.
pub const PAGE_COUNT: usize = FLASH_SIZE / PAGE_SIZE;

/// Address of start of RAM.
pub const RAM_START: usize = 0x2000_0000;

/// RAM size.
pub const RAM_SIZE: usize = 20 * 1024;

/// Bootloader image.
pub const BOOTLOADER: FlashRegion = FlashRegion::new(FLASH_START, 25 * 1024);

/// Receiver (updater) image.
pub const RECEIVER: FlashRegion = FlashRegion::new(0x0800_6400, 30 * 1024);

/// New firmware, written by the receiver and started by the bootloader.
pub const FIRMWARE: FlashRegion = FlashRegion::new(0x0800_DC00, 30 * 1024);

/// Word probed by the bootloader to decide whether firmware is present.
pub const FIRMWARE_PROBE: usize = FIRMWARE.base;

/// Payload bytes per CAN frame.
pub const CHUNK_SIZE: usize = 8;

/// Largest image the receiver can reassemble in RAM.
pub const MAX_IMAGE_SIZE: usize = 16 * 1024;

/// Value of an erased flash word.
pub const ERASED_WORD: u32 = 0xffff_ffff;

/// Number of chunks needed to transfer an image of `len` bytes.
pub const fn chunk_count(len: usize) -> usize {
    (len + CHUNK_SIZE - 1) / CHUNK_SIZE
}

/// Base address of the flash page containing `addr`.
pub const fn page_base(addr: usize) -> usize {
    (addr / PAGE_SIZE) * PAGE_SIZE
}

/// Returns true, if the address points to the beginning of a flash page.
pub const fn is_page_aligned(addr: usize) -> bool {
    addr % PAGE_SIZE == 0
}

/// Returns true, if the address lies within flash memory.
pub const fn is_flash(addr: usize) -> bool {
    addr >= FLASH_START && addr < FLASH_END
}

/// Base address of the flash page with the specified index.
pub const fn page_address(index: usize) -> Option<usize> {
    if index < PAGE_COUNT {
        Some(FLASH_START + index * PAGE_SIZE)
    } else {
        None
    }
}

/// A contiguous range of flash holding one image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashRegion {
    /// First byte.
    pub base: usize,
    /// First byte after the region.
    pub end: usize,
    /// Page size.
    pub page_size: usize,
}

impl FlashRegion {
    /// Region of `len` bytes starting at `base`.
    pub const fn new(base: usize, len: usize) -> Self {
        Self { base, end: base + len, page_size: PAGE_SIZE }
    }

    /// Size in bytes.
    pub const fn len(&self) -> usize {
        self.end - self.base
    }

    /// Returns true, if the region has zero size.
    pub const fn is_empty(&self) -> bool {
        self.end == self.base
    }

    /// Base address of the last page of the region.
    pub const fn last_page(&self) -> usize {
        self.end - self.page_size
    }

    /// Number of pages.
    pub const fn pages(&self) -> usize {
        self.len() / self.page_size
    }

    /// Returns true, if `len` bytes at `addr` fit into the region.
    pub const fn contains(&self, addr: usize, len: usize) -> bool {
        addr >= self.base && addr <= self.end && len <= self.end - addr
    }

    /// Returns true, if the region is page aligned and within flash memory.
    pub const fn is_valid(&self) -> bool {
        is_page_aligned(self.base)
            && is_page_aligned(self.end)
            && self.base >= FLASH_START
            && self.end <= FLASH_END
            && self.base < self.end
    }

    /// Returns true, if both regions share at least one byte.
    pub const fn overlaps(&self, other: &FlashRegion) -> bool {
        self.base < other.end && other.base < self.end
    }
}
