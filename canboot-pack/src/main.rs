//! Check and prepare firmware images for transfer over CAN.

use anyhow::{bail, ensure, Context};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use clap::Parser;
use std::{fs, fs::File, io::Write, path::PathBuf};

use canboot_build::parse_maybe_hex;
use canboot_shared::{
    jump::AppHeader,
    layout::{chunk_count, FlashRegion, CHUNK_SIZE, ERASED_WORD, FIRMWARE, MAX_IMAGE_SIZE},
    sender::PADDING,
};

/// Check a firmware binary and prepare it for transfer over CAN.
#[derive(Parser, Debug)]
struct Args {
    /// Override base address the firmware is linked to.
    #[clap(long, value_parser=parse_maybe_hex)]
    base: Option<usize>,
    /// Pad the image to a whole number of chunks.
    #[clap(long)]
    pad: bool,
    /// Source path of raw firmware binary.
    src: PathBuf,
    /// Destination path of checked firmware.
    dst: Option<PathBuf>,
}

/// Reads the vector table header from the start of an image.
fn header(data: &[u8]) -> anyhow::Result<AppHeader> {
    let mut rdr = data;
    let stack_pointer = rdr.read_u32::<LE>().context("image too short for stack pointer")?;
    let entry = rdr.read_u32::<LE>().context("image too short for reset vector")?;
    Ok(AppHeader { stack_pointer, entry })
}

/// Checks that `data` is a firmware image runnable from `region`.
fn check(data: &[u8], region: FlashRegion) -> anyhow::Result<AppHeader> {
    ensure!(!data.is_empty(), "image is empty");
    ensure!(data.len() <= MAX_IMAGE_SIZE, "image of {} bytes exceeds maximum of {MAX_IMAGE_SIZE} bytes", data.len());
    ensure!(
        data.len() <= region.len(),
        "image of {} bytes exceeds region of {} bytes",
        data.len(),
        region.len()
    );

    let header = header(data)?;
    if header.stack_pointer == ERASED_WORD {
        bail!("image starts with erased flash");
    }
    ensure!(header.is_plausible(), "implausible vector table: {header:x?}");

    let entry = (header.entry & !1) as usize;
    ensure!(
        region.contains(entry, 2) && entry < region.base + data.len(),
        "reset vector 0x{:08x} lies outside image at 0x{:08x}",
        header.entry,
        region.base
    );

    Ok(header)
}

/// Pads `data` to a whole number of chunks.
fn pad(data: &mut Vec<u8>) -> anyhow::Result<()> {
    while data.len() % CHUNK_SIZE != 0 {
        data.write_u8(PADDING)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let region = match args.base {
        Some(base) => FlashRegion::new(base, FIRMWARE.len()),
        None => FIRMWARE,
    };
    ensure!(region.is_valid(), "base 0x{:08x} is not a valid flash region", region.base);

    let mut data = fs::read(&args.src).with_context(|| format!("cannot read {}", args.src.display()))?;
    let header = check(&data, region)?;

    if args.pad {
        pad(&mut data)?;
    }

    let dst = args.dst.unwrap_or_else(|| args.src.with_extension("can.bin"));
    let mut dst_file = File::create(&dst)?;
    dst_file.write_all(&data)?;
    dst_file.flush()?;

    eprintln!(
        "{} -> {} @ 0x{:08x} (sp: 0x{:08x}, entry: 0x{:08x}, CRC32: {:08x})",
        args.src.to_string_lossy(),
        dst.to_string_lossy(),
        region.base,
        header.stack_pointer,
        header.entry,
        crc32fast::hash(&data)
    );
    eprintln!("{} bytes in {} chunks", data.len(), chunk_count(data.len()));
    println!("CANBOOT_IMAGE_SIZE={}", data.len());

    Ok(())
}
