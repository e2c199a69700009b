//! Generic board.
//!
//! Blue pill style STM32F103C8 with a HD44780 display and two buttons
//! on the bootloader node.

use crate::board::Board;

/// Generic board.
pub struct BoardImpl;

impl Board for BoardImpl {
    fn new() -> Self {
        Self
    }

    fn model(&self) -> &'static str {
        "generic"
    }
}
