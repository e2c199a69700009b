//! Signals between interrupt handler and main loop.
//!
//! Each signal has exactly one writer per direction: the interrupt handler
//! raises, the main loop clears.

use core::sync::atomic::{AtomicBool, Ordering};

/// Acknowledgment flag of the sender.
///
/// Raised by the CAN receive interrupt when the receiver acknowledged a chunk,
/// cleared by the send loop right before it submits the next chunk.
pub struct AckFlag(AtomicBool);

impl AckFlag {
    /// Creates a flag.
    ///
    /// The sender starts raised, since no chunk is outstanding yet.
    pub const fn new(raised: bool) -> Self {
        Self(AtomicBool::new(raised))
    }

    /// Raises the flag.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the flag is raised.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the flag.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for AckFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn raise_and_clear() {
        let flag = AckFlag::new(false);
        assert!(!flag.is_raised());
        flag.raise();
        assert!(flag.is_raised());
        flag.clear();
        assert!(!flag.is_raised());
        assert!(AckFlag::default().is_raised());
    }

    #[test]
    fn raise_from_other_context() {
        let flag = Arc::new(AckFlag::new(false));
        let isr = {
            let flag = flag.clone();
            thread::spawn(move || flag.raise())
        };
        isr.join().unwrap();
        assert!(flag.is_raised());
    }
}
