// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod process;
pub mod status;
pub mod types;

use std::fs;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{RawRunConfig, RunConfiguration, TargetSpec, load_or_default};
use crate::process::ScanProcess;
use crate::types::LifecycleState;

pub use crate::errors::ScanError;
pub use crate::status::{Observer, RunMonitor, ScanEvent, ScanStatus};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading
/// - run configuration validation
/// - the scan process with a progress observer
/// - Ctrl-C handling
/// - writing the XML output
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = load_or_default(args.config.as_deref())?;

    let raw = RawRunConfig {
        targets: TargetSpec::Delimited(args.targets.join(",")),
        options: args.options.clone(),
        run_as: args.sudo.clone(),
        safe_mode: settings.safe_mode && !args.allow_unsafe,
    };
    let config = RunConfiguration::try_from(raw)?;

    let mut scan = ScanProcess::builder(config)
        .settings(settings)
        .observer(|status, _chunk| {
            let p = status.progress();
            if status.is_running() {
                info!(
                    percent = %p.progress,
                    etc = %p.etc,
                    task = %p.task,
                    "scan progress"
                );
            }
        })
        .build()?;

    if args.dry_run {
        print_dry_run(&scan);
        return Ok(());
    }

    // Ctrl-C → interrupt the consumption loop.
    {
        let handle = scan.interrupt_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            handle.interrupt();
        });
    }

    let code = scan.run().await?;
    debug!(?code, state = %scan.state(), "scan returned");

    match &args.output {
        Some(path) => fs::write(path, scan.stdout())
            .with_context(|| format!("writing scan output to '{}'", path.display()))?,
        None => print!("{}", scan.stdout()),
    }

    match scan.state() {
        LifecycleState::Done => {
            info!(
                version = %scan.version(),
                started = %scan.start_time(),
                ended = %scan.end_time(),
                bytes = scan.stdout().len(),
                summary = %scan.summary(),
                "scan finished"
            );
            Ok(())
        }
        LifecycleState::Cancelled => bail!("scan was cancelled before it finished"),
        state => bail!(
            "scan ended in state '{state}' with exit code {:?}: {}",
            code,
            scan.stderr().trim_end()
        ),
    }
}

/// Print what would be executed without running it.
fn print_dry_run(scan: &ScanProcess) {
    println!("scanproc dry-run");
    println!("  targets: {:?}", scan.config().targets());
    println!("  safe_mode: {}", scan.config().safe_mode());
    if let Some(user) = scan.config().run_as() {
        println!("  run_as: {user} (via sudo)");
    }
    println!("  stderr_capture: {:?}", scan.settings().stderr_capture);
    println!("  command: {}", scan.command_line());

    debug!("dry-run complete (no execution)");
}
