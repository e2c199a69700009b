//! CAN frames of the transfer protocol.
//!
//! Data frames carry one 8 byte chunk of the image on [`DATA_ID`].
//! The receiver answers each with a one byte frame on [`ACK_ID`] carrying
//! [`ACK_SENTINEL`]. Frames have no sequence number; ordering follows from
//! the stop-and-wait discipline.

use embedded_hal::can::{self, Id, StandardId};

use crate::layout::CHUNK_SIZE;

/// Identifier of firmware data frames.
// SAFETY: 0x123 fits into 11 bits.
pub const DATA_ID: StandardId = unsafe { StandardId::new_unchecked(0x123) };

/// Identifier of acknowledgment frames.
// SAFETY: 0x456 fits into 11 bits.
pub const ACK_ID: StandardId = unsafe { StandardId::new_unchecked(0x456) };

/// Payload byte of an acknowledgment frame.
pub const ACK_SENTINEL: u8 = 0x1f;

/// Maximum payload of a classic CAN frame.
pub const MAX_DLC: usize = 8;

/// A classic CAN frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    id: Id,
    remote: bool,
    dlc: u8,
    data: [u8; MAX_DLC],
}

impl Frame {
    /// Data frame carrying one chunk of the image.
    pub fn chunk(chunk: &[u8; CHUNK_SIZE]) -> Self {
        Self { id: DATA_ID.into(), remote: false, dlc: CHUNK_SIZE as u8, data: *chunk }
    }

    /// Acknowledgment frame.
    pub fn ack() -> Self {
        let mut data = [0; MAX_DLC];
        data[0] = ACK_SENTINEL;
        Self { id: ACK_ID.into(), remote: false, dlc: 1, data }
    }

    /// Raw 11-bit identifier, if this is a standard frame.
    pub fn standard_id(&self) -> Option<u16> {
        match self.id {
            Id::Standard(id) => Some(id.as_raw()),
            Id::Extended(_) => None,
        }
    }

    /// Whether this frame acknowledges a chunk.
    ///
    /// A frame counts as acknowledgment if it arrives on [`ACK_ID`] or its
    /// first payload byte is [`ACK_SENTINEL`].
    pub fn is_ack(&self) -> bool {
        self.id == Id::Standard(ACK_ID) || (!self.remote && self.dlc > 0 && self.data[0] == ACK_SENTINEL)
    }

    /// Payload as a chunk, if this is a well-formed data frame.
    pub fn as_chunk(&self) -> Option<&[u8; CHUNK_SIZE]> {
        if self.id == Id::Standard(DATA_ID) && !self.remote && usize::from(self.dlc) == CHUNK_SIZE {
            Some(&self.data)
        } else {
            None
        }
    }
}

impl can::Frame for Frame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DLC {
            return None;
        }
        let mut buf = [0; MAX_DLC];
        buf[..data.len()].copy_from_slice(data);
        Some(Self { id: id.into(), remote: false, dlc: data.len() as u8, data: buf })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > MAX_DLC {
            return None;
        }
        Some(Self { id: id.into(), remote: true, dlc: dlc as u8, data: [0; MAX_DLC] })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc.into()
    }

    fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data[..self.dlc()]
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Frame {
    fn format(&self, fmt: defmt::Formatter) {
        use can::Frame as _;
        match self.id {
            Id::Standard(id) => defmt::write!(fmt, "frame 0x{:03x} {=[u8]:x}", id.as_raw(), self.data()),
            Id::Extended(id) => defmt::write!(fmt, "frame 0x{:08x} (ext) {=[u8]:x}", id.as_raw(), self.data()),
        }
    }
}
