use std::{env, path::PathBuf};

use canboot_shared::layout::{MAX_IMAGE_SIZE, RECEIVER};

fn main() {
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());

    canboot_build::write_memory_x(out, RECEIVER).unwrap();

    let size = canboot_build::image_size().unwrap();
    if size == 0 || size > MAX_IMAGE_SIZE {
        panic!("image size {size} must be between 1 and {MAX_IMAGE_SIZE} bytes");
    }
    canboot_build::write_image_size(out, size).unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
