// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawSettingsFile, ScanSettings};
use crate::errors::Result;

/// Load a settings file from a given path and return the raw `RawSettingsFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] to get
/// usable [`ScanSettings`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSettingsFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let settings: RawSettingsFile = toml::from_str(&contents)?;

    Ok(settings)
}

/// Load a settings file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ScanSettings> {
    let raw = load_from_path(&path)?;
    ScanSettings::try_from(raw)
}

/// Resolve the settings used by the CLI.
///
/// - An explicit path must exist and be valid.
/// - Without one, [`default_config_path`] is used when the file exists;
///   otherwise the built-in defaults apply.
pub fn load_or_default(explicit: Option<&Path>) -> Result<ScanSettings> {
    if let Some(path) = explicit {
        return load_and_validate(path);
    }

    let default_path = default_config_path();
    if default_path.is_file() {
        debug!(path = %default_path.display(), "loading default settings file");
        load_and_validate(default_path)
    } else {
        Ok(ScanSettings::default())
    }
}

/// `Scanproc.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Scanproc.toml")
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;
    use crate::errors::ScanError;
    use crate::types::StderrCapture;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan]\nbinary = \"/opt/nmap/bin/nmap\"\nstderr_capture = \"complete\"").unwrap();

        let settings = load_and_validate(file.path()).unwrap();
        assert_eq!(settings.binary, PathBuf::from("/opt/nmap/bin/nmap"));
        assert_eq!(settings.stderr_capture, StderrCapture::Complete);
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert!(settings.safe_mode);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let settings = load_and_validate(file.path()).unwrap();
        assert_eq!(settings, ScanSettings::default());
    }

    #[test]
    fn invalid_toml_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scan]\nstderr_capture = \"sometimes\"").unwrap();
        assert!(matches!(
            load_and_validate(file.path()),
            Err(ScanError::TomlError(_))
        ));
    }

    #[test]
    fn explicit_missing_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_or_default(Some(&missing)),
            Err(ScanError::IoError(_))
        ));
    }
}
