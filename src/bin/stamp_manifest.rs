//! Model manifest stamping utility.
//!
//! Recomputes the SHA-256 of every target file listed in a model
//! directory's `manifest.json`, writes the digests back, then loads the
//! directory to check it is servable.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin stamp_manifest -- <model_dir>
//! ```

use std::env;
use std::path::PathBuf;

use trialsafe::adapters::xgboost::{stamp_manifest, MANIFEST_FILE};
use trialsafe::adapters::XgbMultiOutputModel;

fn usage() -> String {
    "Usage: stamp_manifest <model_dir>".to_string()
}

fn parse_args() -> Result<PathBuf, String> {
    let mut args = env::args().skip(1);
    let model_dir = match args.next().as_deref() {
        None | Some("-h" | "--help") => return Err(usage()),
        Some(dir) => PathBuf::from(dir),
    };
    if args.next().is_some() {
        return Err(usage());
    }

    // Accept a path to the manifest itself.
    if model_dir.file_name().is_some_and(|n| n == MANIFEST_FILE) {
        return model_dir
            .parent()
            .map(PathBuf::from)
            .ok_or_else(|| "Manifest path has no parent directory".to_string());
    }
    Ok(model_dir)
}

fn main() -> Result<(), String> {
    let model_dir = parse_args()?;

    let digests = stamp_manifest(&model_dir).map_err(|e| e.to_string())?;
    for (file, digest) in &digests {
        println!("{digest}  {file}");
    }

    XgbMultiOutputModel::load(&model_dir)
        .map_err(|e| format!("Manifest stamped but model does not load: {e}"))?;

    println!(
        "Wrote {} digests to {:?}",
        digests.len(),
        model_dir.join(MANIFEST_FILE)
    );
    Ok(())
}
