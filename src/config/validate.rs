// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::{
    RawRunConfig, RawSettingsFile, RunConfiguration, ScanSettings, TargetSpec,
};
use crate::errors::{Result, ScanError};

/// Options that make the scanner read or write files on the local host.
/// Rejected while safe mode is on.
pub const UNSAFE_OPTIONS: &[&str] = &[
    "-oG",
    "-oN",
    "-iL",
    "-oA",
    "-oS",
    "-oX",
    "--iflist",
    "--resume",
    "--stylesheet",
    "--datadir",
];

impl TryFrom<RawRunConfig> for RunConfiguration {
    type Error = ScanError;

    fn try_from(raw: RawRunConfig) -> std::result::Result<Self, Self::Error> {
        let targets = parse_targets(&raw.targets)?;
        if raw.safe_mode {
            ensure_safe_options(&raw.options)?;
        }
        let run_as = match raw.run_as {
            Some(user) if user.trim().is_empty() => {
                return Err(ScanError::ConfigError(
                    "elevation user must not be empty".to_string(),
                ));
            }
            other => other,
        };
        Ok(RunConfiguration::new_unchecked(
            targets,
            raw.options,
            run_as,
            raw.safe_mode,
        ))
    }
}

impl TryFrom<RawSettingsFile> for ScanSettings {
    type Error = ScanError;

    fn try_from(raw: RawSettingsFile) -> std::result::Result<Self, Self::Error> {
        let scan = raw.scan;

        if scan.binary.trim().is_empty() {
            return Err(ScanError::ConfigError(
                "[scan].binary must not be empty".to_string(),
            ));
        }
        if scan.poll_interval_ms == 0 {
            return Err(ScanError::ConfigError(
                "[scan].poll_interval_ms must be >= 1 (got 0)".to_string(),
            ));
        }

        Ok(ScanSettings {
            binary: PathBuf::from(scan.binary.trim()),
            fixed_options: scan
                .fixed_options
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            safe_mode: scan.safe_mode,
            poll_interval: Duration::from_millis(scan.poll_interval_ms),
            stderr_wait: Duration::from_millis(scan.stderr_wait_ms),
            stderr_capture: scan.stderr_capture,
        })
    }
}

/// Split target input into an ordered, non-empty list of hosts.
///
/// The delimited form drops all spaces and splits on `,`; empty segments
/// (e.g. a trailing comma) are skipped. The list form keeps entries as given
/// (trimmed) and rejects empty ones.
pub fn parse_targets(spec: &TargetSpec) -> Result<Vec<String>> {
    let targets: Vec<String> = match spec {
        TargetSpec::Delimited(s) => s
            .replace(' ', "")
            .split(',')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        TargetSpec::List(list) => {
            let mut out = Vec::with_capacity(list.len());
            for (idx, entry) in list.iter().enumerate() {
                let entry = entry.trim();
                if entry.is_empty() {
                    return Err(ScanError::ConfigError(format!(
                        "target list entry {idx} is empty"
                    )));
                }
                out.push(entry.to_string());
            }
            out
        }
    };

    if targets.is_empty() {
        return Err(ScanError::ConfigError(
            "at least one scan target is required".to_string(),
        ));
    }
    Ok(targets)
}

/// Fail with every unsafe token found in `options`, in order of appearance.
pub fn ensure_safe_options(options: &str) -> Result<()> {
    let mut found: Vec<&str> = Vec::new();
    for token in options.split_whitespace() {
        if UNSAFE_OPTIONS.contains(&token) && !found.contains(&token) {
            found.push(token);
        }
    }

    if found.is_empty() {
        Ok(())
    } else {
        Err(ScanError::ConfigError(format!(
            "unsafe options used while safe mode is enabled: {}",
            found.join(", ")
        )))
    }
}
