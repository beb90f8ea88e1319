// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `scanproc`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scanproc",
    version,
    about = "Run an nmap scan, report progress while it runs and keep its XML output.",
    long_about = None
)]
pub struct CliArgs {
    /// Hosts to scan. Each argument may itself be a comma separated list.
    #[arg(required = true, value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Scanner options, passed through after the fixed output flags.
    #[arg(long, short = 'o', value_name = "OPTS", default_value = "-sT", allow_hyphen_values = true)]
    pub options: String,

    /// Run the scanner through `sudo -u USER`.
    #[arg(long, value_name = "USER")]
    pub sudo: Option<String>,

    /// Allow options that write files or read inputs (-oN, -iL, ...).
    #[arg(long = "unsafe")]
    pub allow_unsafe: bool,

    /// Path to the settings file (TOML).
    ///
    /// Default: `Scanproc.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the raw XML produced by the scanner to this file.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCANPROC_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate the configuration and print the command line without running it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
