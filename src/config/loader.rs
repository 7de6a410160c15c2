// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Manifest, RawManifest};
use crate::errors::Result;

/// Load a manifest from a given path and return the raw `RawManifest`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawManifest> {
    let contents = fs::read_to_string(path.as_ref())?;
    let manifest: RawManifest = toml::from_str(&contents)?;
    Ok(manifest)
}

/// Parse and validate a manifest held in memory.
pub fn load_from_str(contents: &str) -> Result<Manifest> {
    let raw: RawManifest = toml::from_str(contents)?;
    Manifest::try_from(raw)
}

/// Load a manifest from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks resource key syntax, scheduler limits and duration strings.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Manifest> {
    let raw = load_from_path(&path)?;
    Manifest::try_from(raw)
}

/// `Kubedag.toml` in the current working directory.
pub fn default_manifest_path() -> PathBuf {
    PathBuf::from("Kubedag.toml")
}
