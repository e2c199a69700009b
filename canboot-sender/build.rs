use std::{
    env, fs,
    path::{Path, PathBuf},
};

use canboot_build::STANDALONE;
use canboot_shared::layout::MAX_IMAGE_SIZE;

/// Image produced by `cargo xtask`, used when `CANBOOT_IMAGE` is unset.
const DEFAULT_IMAGE: &str = "../image/canboot-app.bin";

fn main() {
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());

    canboot_build::write_memory_x(out, STANDALONE).unwrap();

    let src = canboot_build::image_path().unwrap_or_else(|| DEFAULT_IMAGE.to_string());
    if !Path::new(&src).is_file() {
        panic!("image {src} not found, set CANBOOT_IMAGE or run cargo xtask");
    }
    println!("cargo:rerun-if-changed={src}");

    let image = fs::read(&src).unwrap();
    if image.is_empty() || image.len() > MAX_IMAGE_SIZE {
        panic!("image size {} must be between 1 and {MAX_IMAGE_SIZE} bytes", image.len());
    }
    fs::write(out.join("image.bin"), image).unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
