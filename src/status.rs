// src/status.rs

//! Per-invocation status: lifecycle state, progress snapshot, exit code and
//! captured output.
//!
//! State and progress are published through `tokio::sync::watch` so that a
//! [`RunMonitor`] on another task always reads a complete record: a marker
//! that changes several fields (percent + etc) becomes visible as one update.

use tokio::sync::watch;

use crate::exec::events::{ProgressSnapshot, extract_into};
use crate::types::LifecycleState;

/// Synchronous progress observer.
///
/// Called on the consumption loop for every chunk that contained at least
/// one marker, with the status as it is after the markers were applied and
/// the raw chunk. The chunk is appended to [`ScanStatus::stdout`] only after
/// the observer returns. A slow observer delays output consumption and can
/// eventually block the scanner on a full pipe; use
/// [`crate::process::ScanProcess::subscribe_events`] for heavy work.
pub type Observer = Box<dyn FnMut(&ScanStatus, &str) + Send>;

/// Asynchronous counterpart of [`Observer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub chunk: String,
    pub progress: ProgressSnapshot,
}

#[derive(Debug)]
pub struct ScanStatus {
    state: watch::Sender<LifecycleState>,
    progress: watch::Sender<ProgressSnapshot>,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanStatus {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Ready);
        let (progress, _) = watch::channel(ProgressSnapshot::default());
        Self {
            state,
            progress,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Copy of the current progress record.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.borrow().clone()
    }

    /// Exit code of the last run; `None` before it ends, or when it was
    /// cancelled or failed to spawn.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Everything read from stdout so far, newlines included.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Stderr captured after a failed run; empty otherwise.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    pub fn has_terminated(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn has_failed(&self) -> bool {
        self.state() == LifecycleState::Failed
    }

    pub fn is_successful(&self) -> bool {
        self.state() == LifecycleState::Done
    }

    pub fn monitor(&self) -> RunMonitor {
        RunMonitor {
            state: self.state.subscribe(),
            progress: self.progress.subscribe(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.exit_code = None;
        self.stdout.clear();
        self.stderr.clear();
        self.progress.send_replace(ProgressSnapshot::default());
        self.state.send_replace(LifecycleState::Ready);
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        self.state.send_replace(state);
    }

    pub(crate) fn set_exit_code(&mut self, code: Option<i32>) {
        self.exit_code = code;
    }

    /// Apply every marker in `chunk` as one update. Subscribers are only
    /// notified when a marker was recognised; the return value says whether
    /// one was.
    pub(crate) fn apply_chunk(&self, chunk: &str) -> bool {
        self.progress
            .send_if_modified(|snapshot| extract_into(chunk, snapshot))
    }

    pub(crate) fn force_complete(&self) {
        self.progress
            .send_modify(|snapshot| snapshot.progress = "100".to_string());
    }

    pub(crate) fn push_stdout(&mut self, chunk: &str) {
        self.stdout.push_str(chunk);
    }

    pub(crate) fn set_stderr(&mut self, stderr: String) {
        self.stderr = stderr;
    }
}

/// Read-only view of a [`ScanStatus`] that can be moved to another task.
///
/// Survives across runs of the same process: a new run resets the values it
/// observes to `Ready` and the default snapshot.
#[derive(Debug, Clone)]
pub struct RunMonitor {
    state: watch::Receiver<LifecycleState>,
    progress: watch::Receiver<ProgressSnapshot>,
}

impl RunMonitor {
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    pub fn has_terminated(&self) -> bool {
        self.state().is_terminal()
    }

    /// Wait for the next progress update. `None` once the process is gone.
    pub async fn progress_changed(&mut self) -> Option<ProgressSnapshot> {
        self.progress.changed().await.ok()?;
        Some(self.progress.borrow_and_update().clone())
    }

    /// Wait until the state is terminal. Returns immediately if it already
    /// is, including a terminal state left over from a previous run.
    pub async fn wait_until_terminated(&mut self) -> LifecycleState {
        let waited = self.state.wait_for(|state| state.is_terminal()).await.map(|s| *s);
        match waited {
            Ok(state) => state,
            Err(_) => *self.state.borrow(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_defaults() {
        let mut status = ScanStatus::new();
        status.set_state(LifecycleState::Failed);
        status.set_exit_code(Some(2));
        status.push_stdout("<nmaprun>\n");
        status.set_stderr("boom\n".to_string());
        assert!(status.apply_chunk(r#"<taskprogress task="Ping Scan" percent="40" etc="99"/>"#));

        status.reset();

        assert_eq!(status.state(), LifecycleState::Ready);
        assert_eq!(status.exit_code(), None);
        assert_eq!(status.stdout(), "");
        assert_eq!(status.stderr(), "");
        assert_eq!(status.progress(), ProgressSnapshot::default());
    }

    #[test]
    fn predicates_follow_state() {
        let status = ScanStatus::new();
        assert!(!status.has_terminated());

        status.set_state(LifecycleState::Running);
        assert!(status.is_running());

        status.set_state(LifecycleState::Cancelled);
        assert!(status.has_terminated());
        assert!(!status.has_failed());
        assert!(!status.is_successful());
    }

    #[tokio::test]
    async fn chunk_without_markers_does_not_notify() {
        let status = ScanStatus::new();
        let mut monitor = status.monitor();

        assert!(!status.apply_chunk("<host starttime=\"1\" endtime=\"2\">\n"));
        assert!(!status.apply_chunk("</runstats>\n"));

        let notified = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            monitor.progress_changed(),
        )
        .await;
        assert!(notified.is_err());
        assert_eq!(status.progress(), ProgressSnapshot::default());
    }

    #[tokio::test]
    async fn monitor_sees_whole_marker_updates() {
        let status = ScanStatus::new();
        let mut monitor = status.monitor();

        assert!(status.apply_chunk(
            r#"<taskprogress task="SYN Stealth Scan" percent="42" etc="00:01:30"/>"#
        ));

        let snap = monitor.progress_changed().await.unwrap();
        assert_eq!(snap.progress, "42");
        assert_eq!(snap.etc, "00:01:30");
        assert_eq!(snap.task, "SYN Stealth Scan");
    }
}
