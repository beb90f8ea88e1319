// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The supervisor talks to a `ProcessBackend` instead of `tokio::process`
//! directly, so tests can script a child's output and exit status without
//! spawning anything.
//!
//! - `TokioBackend` is the default implementation used by `scanproc`: it
//!   resolves programs with `which`, looks users up in the system database
//!   and spawns children with piped stdio and `kill_on_drop`.
//! - Tests provide their own backend (see the `scanproc-test-utils` crate).

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::errors::{Result, ScanError};
use crate::exec::command::CommandLine;

/// Readable end of one of the child's output pipes.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// Normal exit with a status code.
    Code(i32),
    /// No status code is available, e.g. the process was killed by a signal.
    Indeterminate,
}

impl From<ExitStatus> for ChildExit {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ChildExit::Code(code),
            None => ChildExit::Indeterminate,
        }
    }
}

/// A spawned child process as seen by the supervisor.
pub trait ScanChild: Send {
    fn take_stdout(&mut self) -> Option<OutputStream>;

    fn take_stderr(&mut self) -> Option<OutputStream>;

    /// Non-blocking exit check.
    fn try_wait(&mut self) -> io::Result<Option<ChildExit>>;

    /// Wait for the child to exit.
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = io::Result<ChildExit>> + Send + '_>>;

    /// Ask the OS to kill the child without waiting for it.
    fn start_kill(&mut self) -> io::Result<()>;

    fn id(&self) -> Option<u32>;
}

/// Trait abstracting how programs are located and started.
pub trait ProcessBackend: Send + Sync {
    /// Resolve a bare program name on `PATH`, or check that a path exists.
    fn resolve_program(&self, program: &Path) -> Result<PathBuf>;

    /// Whether `user` exists in the system user database.
    fn user_exists(&self, user: &str) -> Result<bool>;

    /// Start `command` with stdin, stdout and stderr piped.
    fn spawn(&self, command: &CommandLine) -> io::Result<Box<dyn ScanChild>>;
}

/// Production backend on top of `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioBackend;

impl ProcessBackend for TokioBackend {
    fn resolve_program(&self, program: &Path) -> Result<PathBuf> {
        which::which(program).map_err(|e| {
            ScanError::Environment(format!(
                "'{}' is not installed or could not be found in system path: {e}",
                program.display()
            ))
        })
    }

    #[cfg(unix)]
    fn user_exists(&self, user: &str) -> Result<bool> {
        nix::unistd::User::from_name(user)
            .map(|found| found.is_some())
            .map_err(|e| {
                ScanError::Environment(format!("looking up user '{user}' failed: {e}"))
            })
    }

    #[cfg(not(unix))]
    fn user_exists(&self, user: &str) -> Result<bool> {
        Err(ScanError::Environment(format!(
            "cannot look up user '{user}': user database is only available on unix"
        )))
    }

    fn spawn(&self, command: &CommandLine) -> io::Result<Box<dyn ScanChild>> {
        let mut cmd = Command::new(command.program());
        cmd.args(command.arguments())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        debug!(pid = ?child.id(), program = %command.program().display(), "child spawned");
        Ok(Box::new(TokioChild { child }))
    }
}

/// [`ScanChild`] backed by a real `tokio::process::Child`.
///
/// The stdin pipe stays open (and unused) for the lifetime of the child.
pub struct TokioChild {
    child: Child,
}

impl ScanChild for TokioChild {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.child
            .stdout
            .take()
            .map(|s| Box::new(s) as OutputStream)
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.child
            .stderr
            .take()
            .map(|s| Box::new(s) as OutputStream)
    }

    fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
        Ok(self.child.try_wait()?.map(ChildExit::from))
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = io::Result<ChildExit>> + Send + '_>> {
        Box::pin(async move { self.child.wait().await.map(ChildExit::from) })
    }

    fn start_kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn id(&self) -> Option<u32> {
        self.child.id()
    }
}
