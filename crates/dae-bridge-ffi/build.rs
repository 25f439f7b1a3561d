//! Generates `include/dae_bridge.h` from the `extern "C"` surface.

use std::error::Error;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn Error>> {
    let crate_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR")?);
    let config_path = crate_dir.join("cbindgen.toml");

    println!("cargo:rerun-if-changed={}", config_path.display());
    println!("cargo:rerun-if-changed=src");

    let config = cbindgen::Config::from_file(&config_path)?;
    let include = crate_dir.join("include");
    std::fs::create_dir_all(&include)?;

    cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()?
        .write_to_file(include.join("dae_bridge.h"));
    Ok(())
}
