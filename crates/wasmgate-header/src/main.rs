//! Regenerates `include/wasmgate.h` from the `wasmgate-ffi` sources.
//!
//! Run with `cargo run -p wasmgate-header` after changing the C ABI.

use std::env;
use std::path::PathBuf;

use anyhow::Context as _;

const HEADER: &str = "wasmgate.h";

fn main() -> anyhow::Result<()> {
    let crate_dir =
        env::var("CARGO_MANIFEST_DIR").context("failed to lookup `CARGO_MANIFEST_DIR`")?;
    let crate_dir = PathBuf::from(crate_dir);
    let crates = crate_dir
        .parent()
        .context("failed to lookup crate parent directory")?;
    let root = crates
        .parent()
        .context("failed to lookup workspace root directory")?;

    let config = cbindgen::Config {
        language: cbindgen::Language::C,
        include_guard: Some("WASMGATE_H".into()),
        cpp_compat: true,
        ..Default::default()
    };
    let bindings = cbindgen::generate_with_config(crates.join("wasmgate-ffi"), config)
        .context("failed to generate bindings")?;

    let out = root.join("include").join(HEADER);
    bindings.write_to_file(&out);
    println!("wrote {}", out.display());
    Ok(())
}
