// src/config/mod.rs

//! Configuration loading and validation for scanproc.
//!
//! Responsibilities:
//! - Define the TOML-backed settings and the per-scan input (`model.rs`).
//! - Load a settings file from disk (`loader.rs`).
//! - Validate targets, unsafe options and settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    RawRunConfig, RawSettingsFile, RunConfiguration, ScanSection, ScanSettings, TargetSpec,
};
pub use validate::{UNSAFE_OPTIONS, ensure_safe_options, parse_targets};
