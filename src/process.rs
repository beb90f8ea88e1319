// src/process.rs

//! Public entry point: one [`ScanProcess`] per scan configuration.
//!
//! ```no_run
//! # async fn demo() -> scanproc::errors::Result<()> {
//! use scanproc::config::RunConfiguration;
//! use scanproc::process::ScanProcess;
//!
//! let config = RunConfiguration::new("scanme.nmap.org", "-sT")?;
//! let mut scan = ScanProcess::builder(config)
//!     .observer(|status, _chunk| {
//!         let p = status.progress();
//!         println!("{}% (etc {})", p.progress, p.etc);
//!     })
//!     .build()?;
//!
//! scan.run().await?;
//! if scan.is_successful() {
//!     println!("{} bytes of XML", scan.stdout().len());
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use crate::config::{RunConfiguration, ScanSettings};
use crate::errors::{Result, ScanError};
use crate::exec::backend::{ProcessBackend, TokioBackend};
use crate::exec::command::CommandLine;
use crate::exec::events::ProgressSnapshot;
use crate::exec::supervisor::Supervisor;
use crate::status::{Observer, RunMonitor, ScanEvent, ScanStatus};
use crate::types::LifecycleState;

/// `sudo -u <user>` prefix for a single elevated run.
#[derive(Debug, Clone)]
struct Elevation {
    helper: PathBuf,
    user: String,
}

/// Requests early termination of a running scan from another task.
///
/// The flag is cleared at the start of every run, so interrupting a process
/// that is not running has no lasting effect.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.tx.send_replace(true);
    }
}

pub struct ScanProcessBuilder {
    config: RunConfiguration,
    settings: ScanSettings,
    backend: Arc<dyn ProcessBackend>,
    observer: Option<Observer>,
}

impl ScanProcessBuilder {
    pub fn settings(mut self, settings: ScanSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn backend(mut self, backend: impl ProcessBackend + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    /// Register the synchronous observer. See [`Observer`] for its contract.
    pub fn observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&ScanStatus, &str) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Resolve the scanner binary and build the process.
    ///
    /// Fails with [`ScanError::Environment`] if the binary cannot be found.
    pub fn build(self) -> Result<ScanProcess> {
        let binary = self.backend.resolve_program(&self.settings.binary)?;
        let (interrupt, _) = watch::channel(false);

        Ok(ScanProcess {
            config: self.config,
            settings: self.settings,
            backend: self.backend,
            binary,
            status: ScanStatus::new(),
            observer: self.observer,
            events: None,
            interrupt: Arc::new(interrupt),
        })
    }
}

/// Runner for one scan configuration.
///
/// A process can be run any number of times; each run starts from a clean
/// [`ScanStatus`]. Only one run is in flight at a time (`run` takes
/// `&mut self`); use [`ScanProcess::monitor`] to watch it from elsewhere.
pub struct ScanProcess {
    config: RunConfiguration,
    settings: ScanSettings,
    backend: Arc<dyn ProcessBackend>,
    binary: PathBuf,
    status: ScanStatus,
    observer: Option<Observer>,
    events: Option<mpsc::UnboundedSender<ScanEvent>>,
    interrupt: Arc<watch::Sender<bool>>,
}

impl ScanProcess {
    pub fn builder(config: RunConfiguration) -> ScanProcessBuilder {
        ScanProcessBuilder {
            config,
            settings: ScanSettings::default(),
            backend: Arc::new(TokioBackend),
            observer: None,
        }
    }

    /// Default settings and the real process backend.
    pub fn new(config: RunConfiguration) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Resolved scanner executable.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Replace the synchronous observer.
    pub fn set_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&ScanStatus, &str) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    /// Receive a [`ScanEvent`] for every chunk that carried a marker.
    ///
    /// Delivery never blocks the consumption loop. A second call replaces
    /// the previous subscriber.
    pub fn subscribe_events(&mut self) -> mpsc::UnboundedReceiver<ScanEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn monitor(&self) -> RunMonitor {
        self.status.monitor()
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            tx: Arc::clone(&self.interrupt),
        }
    }

    /// The scan command without any `sudo` prefix.
    pub fn command(&self) -> CommandLine {
        self.build_command(None)
    }

    /// [`ScanProcess::command`] rendered as a single string.
    pub fn command_line(&self) -> String {
        self.command().to_string()
    }

    /// Run the scan to completion.
    ///
    /// When the configuration names a `run_as` user this is the same as
    /// [`ScanProcess::sudo_run`] with that user.
    ///
    /// Returns the exit code (`None` when cancelled). A non-zero exit is not
    /// an error: inspect [`ScanProcess::state`] and [`ScanProcess::stderr`].
    /// Only a failure to spawn is returned as [`ScanError::Spawn`], after the
    /// state has been set to `Failed`.
    pub async fn run(&mut self) -> Result<Option<i32>> {
        match self.config.run_as().map(str::to_string) {
            Some(user) => self.sudo_run(&user).await,
            None => self.run_command(None).await,
        }
    }

    /// Run the scan as `run_as` through `sudo`.
    ///
    /// `sudo` must be configured not to prompt for a password. The elevation
    /// prefix applies to this run only; later calls to [`ScanProcess::run`]
    /// are elevated only if the configuration itself names a user.
    pub async fn sudo_run(&mut self, run_as: &str) -> Result<Option<i32>> {
        let user = run_as
            .split_whitespace()
            .last()
            .ok_or_else(|| ScanError::ConfigError("elevation user must not be empty".to_string()))?
            .to_string();

        if !self.backend.user_exists(&user)? {
            return Err(ScanError::UnknownUser(user));
        }

        let helper = self
            .backend
            .resolve_program(Path::new("sudo"))
            .map_err(|e| {
                ScanError::Environment(format!("cannot run scan with sudo: {e}"))
            })?;

        self.run_command(Some(Elevation { helper, user })).await
    }

    async fn run_command(&mut self, elevation: Option<Elevation>) -> Result<Option<i32>> {
        self.status.reset();
        self.interrupt.send_replace(false);
        let mut interrupt_rx = self.interrupt.subscribe();

        let command = self.build_command(elevation.as_ref());
        info!(command = %command, "starting scan process");

        let child = match self.backend.spawn(&command) {
            Ok(child) => child,
            Err(source) => {
                self.status.set_state(LifecycleState::Failed);
                error!(command = %command, error = %source, "failed to spawn scan process");
                return Err(ScanError::Spawn {
                    program: command.program().display().to_string(),
                    source,
                });
            }
        };

        let code = Supervisor::new(&mut self.status, &self.settings)
            .with_observer(self.observer.as_mut())
            .with_events(self.events.as_ref())
            .supervise(child, &mut interrupt_rx)
            .await;

        Ok(code)
    }

    fn build_command(&self, elevation: Option<&Elevation>) -> CommandLine {
        let command = match elevation {
            Some(elevation) => CommandLine::new(&elevation.helper)
                .args(["-u", elevation.user.as_str()])
                .arg(self.binary.to_string_lossy()),
            None => CommandLine::new(&self.binary),
        };

        command
            .args(self.settings.fixed_options.iter().map(String::as_str))
            .args(self.config.option_tokens())
            .args(self.config.targets().iter().map(String::as_str))
    }

    pub fn status(&self) -> &ScanStatus {
        &self.status
    }

    pub fn state(&self) -> LifecycleState {
        self.status.state()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.exit_code()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.status.progress()
    }

    /// Percent complete, `"0"` until the first progress report.
    pub fn percent(&self) -> String {
        self.status.progress().progress
    }

    /// Estimated time of completion.
    pub fn etc(&self) -> String {
        self.status.progress().etc
    }

    pub fn start_time(&self) -> String {
        self.status.progress().start_time
    }

    pub fn end_time(&self) -> String {
        self.status.progress().end_time
    }

    pub fn elapsed(&self) -> String {
        self.status.progress().elapsed
    }

    pub fn summary(&self) -> String {
        self.status.progress().summary
    }

    /// Scanner version from the run header.
    pub fn version(&self) -> String {
        self.status.progress().version
    }

    pub fn stdout(&self) -> &str {
        self.status.stdout()
    }

    pub fn stderr(&self) -> &str {
        self.status.stderr()
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn has_terminated(&self) -> bool {
        self.status.has_terminated()
    }

    pub fn has_failed(&self) -> bool {
        self.status.has_failed()
    }

    pub fn is_successful(&self) -> bool {
        self.status.is_successful()
    }
}
