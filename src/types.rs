use std::fmt;

use serde::Deserialize;

/// Lifecycle of a single scan invocation.
///
/// - `Ready`: initial state, before spawn or right after a reset.
/// - `Running`: the process is spawned and the consumption loop is active.
/// - `Done`: the process exited with status 0.
/// - `Failed`: non-zero exit status, or the process could not be spawned.
/// - `Cancelled`: no exit status could be obtained (killed by a signal,
///   interrupted by the caller).
///
/// `Done`, `Failed` and `Cancelled` are terminal for one invocation; only a
/// fresh `run` leaves them (through `Ready`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Ready,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl LifecycleState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Ready => "ready",
            LifecycleState::Running => "running",
            LifecycleState::Done => "done",
            LifecycleState::Failed => "failed",
            LifecycleState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Done | LifecycleState::Failed | LifecycleState::Cancelled
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of stderr is collected when the scan fails.
///
/// - `BestEffort`: take whatever the stderr drain has already queued, waiting
///   at most `stderr_wait` for the first line if nothing is queued yet. Late
///   output can be missed (default).
/// - `Complete`: keep reading until the stderr stream closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StderrCapture {
    BestEffort,
    Complete,
}

impl Default for StderrCapture {
    fn default() -> Self {
        StderrCapture::BestEffort
    }
}
