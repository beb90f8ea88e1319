// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    /// A required executable (the scanner itself or `sudo`) is not on `PATH`.
    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown user '{0}': not present in the system user database")]
    UnknownUser(String),

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScanError {
    /// True for errors raised before any process was spawned because of
    /// invalid input rather than a broken environment.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ScanError::ConfigError(_) | ScanError::UnknownUser(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ScanError>;
