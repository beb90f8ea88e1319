// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::StderrCapture;

/// Settings file as read from TOML.
///
/// ```toml
/// [scan]
/// binary = "nmap"
/// fixed_options = "-oX - -vvv --stats-every 2s"
/// safe_mode = true
/// poll_interval_ms = 1000
/// stderr_wait_ms = 2000
/// stderr_capture = "best_effort"
/// ```
///
/// Every key is optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSettingsFile {
    #[serde(default)]
    pub scan: ScanSection,
}

/// `[scan]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanSection {
    /// Scanner executable: a bare name looked up on `PATH`, or a path.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Flags placed right after the executable. They must keep XML on
    /// stdout and periodic progress reports enabled, otherwise no progress
    /// is ever observed.
    #[serde(default = "default_fixed_options")]
    pub fixed_options: String,

    /// Reject options that read or write files on the scanning host.
    #[serde(default = "default_safe_mode")]
    pub safe_mode: bool,

    /// Upper bound on a single wait for stdout in the consumption loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on the wait for stderr after a failed scan.
    #[serde(default = "default_stderr_wait_ms")]
    pub stderr_wait_ms: u64,

    #[serde(default)]
    pub stderr_capture: StderrCapture,
}

fn default_binary() -> String {
    "nmap".to_string()
}

fn default_fixed_options() -> String {
    "-oX - -vvv --stats-every 2s".to_string()
}

fn default_safe_mode() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_stderr_wait_ms() -> u64 {
    2000
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            fixed_options: default_fixed_options(),
            safe_mode: default_safe_mode(),
            poll_interval_ms: default_poll_interval_ms(),
            stderr_wait_ms: default_stderr_wait_ms(),
            stderr_capture: StderrCapture::default(),
        }
    }
}

/// Validated settings used by [`crate::process::ScanProcess`].
///
/// Construct via `ScanSettings::try_from(RawSettingsFile)` or
/// `ScanSettings::default()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub binary: PathBuf,
    pub fixed_options: Vec<String>,
    pub safe_mode: bool,
    pub poll_interval: Duration,
    pub stderr_wait: Duration,
    pub stderr_capture: StderrCapture,
}

impl Default for ScanSettings {
    fn default() -> Self {
        let section = ScanSection::default();
        Self {
            binary: PathBuf::from(section.binary),
            fixed_options: section
                .fixed_options
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            safe_mode: section.safe_mode,
            poll_interval: Duration::from_millis(section.poll_interval_ms),
            stderr_wait: Duration::from_millis(section.stderr_wait_ms),
            stderr_capture: section.stderr_capture,
        }
    }
}

/// Hosts to scan, in the two shapes accepted from callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// Comma separated hosts, e.g. `"10.0.0.1, scanme.nmap.org"`.
    Delimited(String),
    /// One host per entry.
    List(Vec<String>),
}

impl From<&str> for TargetSpec {
    fn from(s: &str) -> Self {
        TargetSpec::Delimited(s.to_string())
    }
}

impl From<String> for TargetSpec {
    fn from(s: String) -> Self {
        TargetSpec::Delimited(s)
    }
}

impl From<Vec<String>> for TargetSpec {
    fn from(v: Vec<String>) -> Self {
        TargetSpec::List(v)
    }
}

impl From<Vec<&str>> for TargetSpec {
    fn from(v: Vec<&str>) -> Self {
        TargetSpec::List(v.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TargetSpec {
    fn from(v: [&str; N]) -> Self {
        TargetSpec::List(v.iter().map(|s| s.to_string()).collect())
    }
}

/// Unvalidated input for one scan.
#[derive(Debug, Clone)]
pub struct RawRunConfig {
    pub targets: TargetSpec,
    pub options: String,
    pub run_as: Option<String>,
    pub safe_mode: bool,
}

impl RawRunConfig {
    /// Safe mode on, no elevation.
    pub fn new(targets: impl Into<TargetSpec>, options: impl Into<String>) -> Self {
        Self {
            targets: targets.into(),
            options: options.into(),
            run_as: None,
            safe_mode: true,
        }
    }
}

/// Validated, immutable description of what to scan.
///
/// Invariants (checked in `TryFrom<RawRunConfig>`):
/// - `targets` is non-empty and contains no empty entries;
/// - with `safe_mode`, no option token is in [`super::UNSAFE_OPTIONS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    targets: Vec<String>,
    options: String,
    run_as: Option<String>,
    safe_mode: bool,
}

impl RunConfiguration {
    /// Shorthand for `RunConfiguration::try_from(RawRunConfig::new(..))`.
    pub fn new(
        targets: impl Into<TargetSpec>,
        options: impl Into<String>,
    ) -> crate::errors::Result<Self> {
        Self::try_from(RawRunConfig::new(targets, options))
    }

    pub(crate) fn new_unchecked(
        targets: Vec<String>,
        options: String,
        run_as: Option<String>,
        safe_mode: bool,
    ) -> Self {
        Self {
            targets,
            options,
            run_as,
            safe_mode,
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    /// Option string split into argv tokens.
    pub fn option_tokens(&self) -> impl Iterator<Item = &str> {
        self.options.split_whitespace()
    }

    /// User that [`crate::process::ScanProcess::run`] elevates to via `sudo`.
    pub fn run_as(&self) -> Option<&str> {
        self.run_as.as_deref()
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }
}
