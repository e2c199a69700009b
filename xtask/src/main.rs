//! Build script.
//!
//! Use `cargo xtask` to execute.

use anyhow::ensure;
use clap::Parser;
use devx_cmd::cmd;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Build CANboot images.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Transfer this firmware binary instead of the demo firmware.
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Board to build.
    #[arg(default_value = "generic")]
    board: String,
}

fn project_root() -> PathBuf {
    Path::new(&env!("CARGO_MANIFEST_DIR")).ancestors().nth(1).unwrap().to_path_buf()
}

/// Builds the firmware crate in `dir` and extracts its raw binary to `image/{name}.bin`.
fn build_binary(cargo: &str, dir: &str, name: &str, board: &str, image: Option<&Path>) -> anyhow::Result<()> {
    let image = image.map(|p| p.to_string_lossy().to_string()).unwrap_or_default();

    cmd!(cargo, "build", "--release")
        .current_dir(project_root().join(dir))
        .env("CANBOOT_BOARD", board)
        .env("CANBOOT_IMAGE", &image)
        .run()?;
    cmd!(cargo, "objcopy", "--release", "--", "-O", "binary", format!("../image/{name}.bin"))
        .current_dir(project_root().join(dir))
        .env("CANBOOT_BOARD", board)
        .env("CANBOOT_IMAGE", &image)
        .run()?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let board = &args.board;
    let board_id = if board == "generic" { String::new() } else { format!("_{board}") };

    let image_dir = project_root().join("image");
    fs::create_dir_all(&image_dir)?;

    let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());

    let src = match &args.image {
        Some(image) => image.canonicalize()?,
        None => {
            build_binary(&cargo, "canboot-app", "canboot-app", board, None)?;
            image_dir.join("canboot-app.bin")
        }
    };
    ensure!(src.is_file(), "firmware image {} not found", src.display());

    let packed = image_dir.join(format!("firmware{board_id}.can.bin"));
    cmd!(
        &cargo,
        "run",
        "--manifest-path",
        "canboot-pack/Cargo.toml",
        "--quiet",
        "--release",
        "--",
        &src,
        &packed
    )
    .current_dir(project_root())
    .run()?;

    build_binary(&cargo, "canboot-bootloader", &format!("canboot_bootloader{board_id}"), board, None)?;
    build_binary(&cargo, "canboot-receiver", &format!("canboot_receiver{board_id}"), board, Some(&packed))?;
    build_binary(&cargo, "canboot-sender", &format!("canboot_sender{board_id}"), board, Some(&packed))?;

    println!();
    println!(
        "Built bootloader, receiver and sender images in image/ for board {board} transferring {} ({} bytes)",
        src.display(),
        fs::metadata(&packed)?.len()
    );

    Ok(())
}
