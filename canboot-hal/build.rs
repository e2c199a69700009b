use std::{env, path::PathBuf};

fn main() {
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());

    let board = canboot_build::write_board_mods(out, &PathBuf::from("src/boards")).unwrap();
    println!("cargo:rustc-env=CANBOOT_BOARD_NAME={board}");

    println!("cargo:rerun-if-changed=build.rs");
}
