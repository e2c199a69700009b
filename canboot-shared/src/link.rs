//! CAN bus transport as seen by the transfer state machines.

use crate::frame::Frame;

/// Transmit side of a CAN controller.
pub trait Transmitter {
    /// Error reported by the controller.
    type Error;

    /// Number of transmit mailboxes that are free.
    fn free_mailboxes(&self) -> usize;

    /// Whether a previously submitted frame is still waiting for transmission.
    fn is_pending(&self) -> bool;

    /// Places a frame into a free mailbox.
    ///
    /// Returns [`nb::Error::WouldBlock`] when all mailboxes are occupied.
    fn transmit(&mut self, frame: &Frame) -> nb::Result<(), Self::Error>;
}

/// Receive notification control of a CAN controller.
pub trait Listener {
    /// Stops raising receive notifications for inbound frames.
    fn stop_listening(&mut self);
}

impl<T: Transmitter> Transmitter for &mut T {
    type Error = T::Error;

    fn free_mailboxes(&self) -> usize {
        (**self).free_mailboxes()
    }

    fn is_pending(&self) -> bool {
        (**self).is_pending()
    }

    fn transmit(&mut self, frame: &Frame) -> nb::Result<(), Self::Error> {
        (**self).transmit(frame)
    }
}

impl<L: Listener> Listener for &mut L {
    fn stop_listening(&mut self) {
        (**self).stop_listening()
    }
}
