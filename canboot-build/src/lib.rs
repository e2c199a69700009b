//! CANboot build tools.
//!
//! Used by the build scripts of the firmware images.

use std::{
    env,
    ffi::OsStr,
    fs,
    fs::File,
    io::{Result, Write},
    num::ParseIntError,
    path::Path,
};

use canboot_shared::layout::{FlashRegion, FLASH_SIZE, FLASH_START, RAM_SIZE, RAM_START};

/// Image length used when neither `CANBOOT_IMAGE` nor `CANBOOT_IMAGE_SIZE` is set.
pub const DEFAULT_IMAGE_SIZE: usize = 6856;

/// Flash region of an image that runs without bootloader.
pub const STANDALONE: FlashRegion = FlashRegion::new(FLASH_START, FLASH_SIZE);

/// Parses a decimal or `0x` prefixed hexadecimal number.
pub fn parse_maybe_hex(s: &str) -> std::result::Result<usize, ParseIntError> {
    match s.to_ascii_lowercase().strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse::<usize>(),
    }
}

/// Linker memory layout for an image placed in `region`.
pub fn memory_x(region: FlashRegion) -> String {
    format!(
        "MEMORY\n{{\n  FLASH : ORIGIN = 0x{:08X}, LENGTH = {}K\n  RAM : ORIGIN = 0x{:08X}, LENGTH = {}K\n}}\n",
        region.base,
        region.len() / 1024,
        RAM_START,
        RAM_SIZE / 1024
    )
}

/// Writes `memory.x` for `region` into `out` and adds `out` to the linker search path.
pub fn write_memory_x(out: &Path, region: FlashRegion) -> Result<()> {
    assert!(region.is_valid(), "invalid flash region {region:x?}");
    fs::write(out.join("memory.x"), memory_x(region))?;
    println!("cargo:rustc-link-search={}", out.display());
    Ok(())
}

/// Path of the application binary to transfer, from `CANBOOT_IMAGE`.
pub fn image_path() -> Option<String> {
    println!("cargo:rerun-if-env-changed=CANBOOT_IMAGE");
    let path = env::var("CANBOOT_IMAGE").ok().filter(|p| !p.is_empty())?;
    println!("cargo:rerun-if-changed={path}");
    Some(path)
}

/// Length of the application image.
///
/// Taken from the file named by `CANBOOT_IMAGE`, else from `CANBOOT_IMAGE_SIZE`,
/// else [`DEFAULT_IMAGE_SIZE`].
pub fn image_size() -> Result<usize> {
    println!("cargo:rerun-if-env-changed=CANBOOT_IMAGE_SIZE");

    if let Some(path) = image_path() {
        return Ok(fs::metadata(path)?.len() as usize);
    }

    match env::var("CANBOOT_IMAGE_SIZE") {
        Ok(size) => Ok(parse_maybe_hex(&size).unwrap_or_else(|_| panic!("invalid CANBOOT_IMAGE_SIZE: {size}"))),
        Err(_) => Ok(DEFAULT_IMAGE_SIZE),
    }
}

/// Writes `image_size.rs` defining `IMAGE_SIZE` into `out`.
pub fn write_image_size(out: &Path, size: usize) -> Result<()> {
    let mut file = File::create(out.join("image_size.rs"))?;
    writeln!(file, "/// Length of the transferred application image.")?;
    writeln!(file, "pub const IMAGE_SIZE: usize = {size};")?;
    Ok(())
}

/// Writes `board_mods.rs` into `out`, declaring all board modules in `boards_dir`
/// and re-exporting the one selected by `CANBOOT_BOARD` as `Chosen`.
pub fn write_board_mods(out: &Path, boards_dir: &Path) -> Result<String> {
    println!("cargo:rerun-if-env-changed=CANBOOT_BOARD");
    println!("cargo:rerun-if-changed={}", boards_dir.display());

    let board = env::var("CANBOOT_BOARD").unwrap_or_else(|_| "generic".to_string()).to_lowercase();
    if !boards_dir.join(format!("{board}.rs")).is_file() {
        panic!("board {board} is unknown");
    }

    let mut board_mods = File::create(out.join("board_mods.rs"))?;
    for entry in fs::read_dir(boards_dir)? {
        let entry = entry?;
        if entry.metadata()?.is_file()
            && entry.path().extension() == Some(OsStr::new("rs"))
            && entry.file_name() != OsStr::new("mod.rs")
        {
            writeln!(&mut board_mods, "#[path=\"{}\"]", entry.path().canonicalize()?.display())?;
            writeln!(&mut board_mods, "mod {};", entry.path().file_stem().unwrap_or_default().to_string_lossy())?;
        }
    }
    writeln!(&mut board_mods, "pub use {board}::BoardImpl as Chosen;")?;

    Ok(board)
}
