//! Register encodings of the bxCAN controller.

use embedded_hal::can::{ExtendedId, Id, StandardId};

/// Mailbox identifier register: transmit request.
pub const TIR_TXRQ: u32 = 1 << 0;

/// Mailbox identifier register: remote frame.
pub const IR_RTR: u32 = 1 << 1;

/// Mailbox identifier register: extended identifier.
pub const IR_IDE: u32 = 1 << 2;

const STID_SHIFT: u32 = 21;
const EXID_SHIFT: u32 = 3;

/// Bit timing of the CAN controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Clock prescaler (1..=1024).
    pub prescaler: u16,
    /// Time quanta in bit segment 1 (1..=16).
    pub bs1: u8,
    /// Time quanta in bit segment 2 (1..=8).
    pub bs2: u8,
    /// Resynchronization jump width (1..=4).
    pub sjw: u8,
}

impl Timing {
    /// 100 kbit/s from an 8 MHz peripheral clock.
    pub const KBIT_100_AT_8MHZ: Self = Self::new(16, 2, 2, 1);

    /// Creates a bit timing.
    pub const fn new(prescaler: u16, bs1: u8, bs2: u8, sjw: u8) -> Self {
        Self { prescaler, bs1, bs2, sjw }
    }

    /// Whether all fields are within the ranges the controller supports.
    pub const fn is_valid(&self) -> bool {
        matches!(self.prescaler, 1..=1024)
            && matches!(self.bs1, 1..=16)
            && matches!(self.bs2, 1..=8)
            && matches!(self.sjw, 1..=4)
    }

    /// Value of the bit timing register in normal mode.
    pub const fn btr(&self) -> u32 {
        (self.prescaler as u32 - 1)
            | (self.bs1 as u32 - 1) << 16
            | (self.bs2 as u32 - 1) << 20
            | (self.sjw as u32 - 1) << 24
    }

    /// Resulting bit rate for the given peripheral clock.
    pub const fn bit_rate(&self, pclk: u32) -> u32 {
        pclk / (self.prescaler as u32 * (1 + self.bs1 as u32 + self.bs2 as u32))
    }
}

/// Identifier register value for a frame, without transmit request.
pub fn identifier(id: Id, remote: bool) -> u32 {
    let rtr = if remote { IR_RTR } else { 0 };
    match id {
        Id::Standard(id) => (id.as_raw() as u32) << STID_SHIFT | rtr,
        Id::Extended(id) => id.as_raw() << EXID_SHIFT | IR_IDE | rtr,
    }
}

/// Identifier and remote flag from a receive identifier register value.
pub fn parse_identifier(rir: u32) -> (Id, bool) {
    let remote = rir & IR_RTR != 0;
    let id = if rir & IR_IDE != 0 {
        match ExtendedId::new(rir >> EXID_SHIFT) {
            Some(id) => Id::Extended(id),
            None => Id::Extended(ExtendedId::MAX),
        }
    } else {
        match StandardId::new((rir >> STID_SHIFT) as u16) {
            Some(id) => Id::Standard(id),
            None => Id::Standard(StandardId::MAX),
        }
    };
    (id, remote)
}

/// Packs up to 8 data bytes into the low and high data registers.
pub fn pack_data(data: &[u8]) -> (u32, u32) {
    let mut bytes = [0; 8];
    let n = data.len().min(8);
    bytes[..n].copy_from_slice(&data[..n]);
    (
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
    )
}

/// Unpacks the low and high data registers.
pub fn unpack_data(low: u32, high: u32) -> [u8; 8] {
    let mut bytes = [0; 8];
    bytes[..4].copy_from_slice(&low.to_le_bytes());
    bytes[4..].copy_from_slice(&high.to_le_bytes());
    bytes
}

/// Filter bank register pair accepting exactly one standard data frame identifier
/// in 32-bit mask mode.
pub fn exact_filter(id: StandardId) -> (u32, u32) {
    let value = (id.as_raw() as u32) << STID_SHIFT;
    let mask = 0x7ff << STID_SHIFT | IR_IDE | IR_RTR;
    (value, mask)
}
