use std::{env, path::PathBuf};

use canboot_shared::layout::BOOTLOADER;

fn main() {
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    canboot_build::write_memory_x(out, BOOTLOADER).unwrap();
    println!("cargo:rerun-if-changed=build.rs");
}
