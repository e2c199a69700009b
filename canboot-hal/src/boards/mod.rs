//! Supported boards.
//!
//! The board is selected at build time through the `CANBOOT_BOARD`
//! environment variable and exported as [`Chosen`].

include!(concat!(env!("OUT_DIR"), "/board_mods.rs"));
