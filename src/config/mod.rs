// src/config/mod.rs

//! Manifest loading and validation for kubedag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a manifest from disk (`loader.rs`).
//! - Validate basic invariants like key syntax and scheduler limits
//!   (`validate.rs`). Dependency cycles and dangling references are left to
//!   the graph builder and cycle detector.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_manifest_path, load_and_validate, load_from_path, load_from_str};
pub use model::{DependencyEntry, Manifest, RawManifest, ResourceEntry, SchedulerSection};
