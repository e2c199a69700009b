use std::{env, path::PathBuf};

use canboot_shared::layout::FIRMWARE;

fn main() {
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    canboot_build::write_memory_x(out, FIRMWARE).unwrap();
    println!("cargo:rerun-if-changed=build.rs");
}
