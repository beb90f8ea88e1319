// src/exec/supervisor.rs

//! Consumption loop for one scan process.
//!
//! The supervisor is the only writer of the [`ScanStatus`] while a run is in
//! flight. It:
//! - starts a drain for stdout and one for stderr,
//! - pulls stdout lines with a bounded wait, runs them through the event
//!   extractor, notifies the observer and accumulates them,
//! - resolves the terminal state from the exit status once the loop ends.

use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ScanSettings;
use crate::exec::backend::{ChildExit, ScanChild};
use crate::exec::drain::spawn_drain;
use crate::status::{Observer, ScanEvent, ScanStatus};
use crate::types::{LifecycleState, StderrCapture};

pub struct Supervisor<'a> {
    status: &'a mut ScanStatus,
    settings: &'a ScanSettings,
    observer: Option<&'a mut Observer>,
    events: Option<&'a mpsc::UnboundedSender<ScanEvent>>,
}

impl<'a> Supervisor<'a> {
    pub fn new(status: &'a mut ScanStatus, settings: &'a ScanSettings) -> Self {
        Self {
            status,
            settings,
            observer: None,
            events: None,
        }
    }

    pub fn with_observer(mut self, observer: Option<&'a mut Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_events(mut self, events: Option<&'a mpsc::UnboundedSender<ScanEvent>>) -> Self {
        self.events = events;
        self
    }

    /// Drive `child` to a terminal state and return its exit code.
    ///
    /// Setting `interrupt` to `true` ends the loop early; a child that is
    /// still alive at that point is killed and the run is `Cancelled`.
    pub async fn supervise(
        mut self,
        mut child: Box<dyn ScanChild>,
        interrupt: &mut watch::Receiver<bool>,
    ) -> Option<i32> {
        let (stdout_tx, mut stdout_rx) = mpsc::unbounded_channel::<String>();
        let (stderr_tx, mut stderr_rx) = mpsc::unbounded_channel::<String>();

        let stdout_drain = match child.take_stdout() {
            Some(stream) => Some(spawn_drain("stdout", stream, stdout_tx)),
            None => {
                warn!("child has no stdout pipe; no progress will be reported");
                drop(stdout_tx);
                None
            }
        };
        let stderr_drain = child
            .take_stderr()
            .map(|stream| spawn_drain("stderr", stream, stderr_tx));

        self.status.set_state(LifecycleState::Running);
        debug!(pid = ?child.id(), "consumption loop started");

        let mut exit = self
            .consume(child.as_mut(), &mut stdout_rx, interrupt)
            .await;

        if exit.is_none() {
            exit = match child.try_wait() {
                Ok(Some(status)) => Some(status),
                Ok(None) => {
                    if let Err(e) = child.start_kill() {
                        warn!(error = %e, "failed to kill interrupted scan process");
                    }
                    None
                }
                Err(e) => {
                    warn!(error = %e, "could not query scan process status");
                    None
                }
            };
        }

        let code = self.resolve(exit, &mut stderr_rx).await;

        // A grandchild may still hold the pipes open; stop reading them.
        for handle in [stdout_drain, stderr_drain].into_iter().flatten() {
            handle.abort();
        }

        code
    }

    /// Loop until the child has exited and stdout is drained, or until
    /// interrupted. Returns the exit status if one was observed.
    async fn consume(
        &mut self,
        child: &mut dyn ScanChild,
        stdout_rx: &mut mpsc::UnboundedReceiver<String>,
        interrupt: &mut watch::Receiver<bool>,
    ) -> Option<ChildExit> {
        let poll = self.settings.poll_interval;
        let mut exit: Option<ChildExit> = None;
        let mut stdout_open = true;

        loop {
            if exit.is_none() {
                exit = match child.try_wait() {
                    Ok(status) => status,
                    Err(e) => {
                        warn!(error = %e, "could not query scan process status");
                        Some(ChildExit::Indeterminate)
                    }
                };
            }

            if stdout_open {
                tokio::select! {
                    biased;
                    _ = interrupted(interrupt) => {
                        info!("scan interrupted by caller");
                        break;
                    }
                    received = timeout(poll, stdout_rx.recv()) => match received {
                        Ok(Some(chunk)) => self.consume_chunk(chunk),
                        Ok(None) => stdout_open = false,
                        // Exited and nothing arrived for a whole interval.
                        Err(_) if exit.is_some() => break,
                        Err(_) => {}
                    }
                }
            } else if exit.is_some() {
                break;
            } else {
                tokio::select! {
                    biased;
                    _ = interrupted(interrupt) => {
                        info!("scan interrupted by caller");
                        break;
                    }
                    waited = timeout(poll, child.wait()) => match waited {
                        Ok(Ok(status)) => exit = Some(status),
                        Ok(Err(e)) => {
                            warn!(error = %e, "waiting for scan process failed");
                            exit = Some(ChildExit::Indeterminate);
                        }
                        Err(_) => {}
                    }
                }
            }
        }

        exit
    }

    fn consume_chunk(&mut self, chunk: String) {
        if self.status.apply_chunk(&chunk) {
            if let Some(observer) = self.observer.as_deref_mut() {
                observer(&*self.status, &chunk);
            }

            if let Some(events) = self.events {
                let event = ScanEvent {
                    chunk: chunk.clone(),
                    progress: self.status.progress(),
                };
                if events.send(event).is_err() {
                    debug!("event subscriber dropped; event discarded");
                }
            }
        }

        self.status.push_stdout(&chunk);
    }

    async fn resolve(
        &mut self,
        exit: Option<ChildExit>,
        stderr_rx: &mut mpsc::UnboundedReceiver<String>,
    ) -> Option<i32> {
        match exit {
            Some(ChildExit::Code(0)) => {
                self.status.set_exit_code(Some(0));
                self.status.force_complete();
                self.status.set_state(LifecycleState::Done);
                info!(exit_code = 0, "scan process finished");
                Some(0)
            }
            Some(ChildExit::Code(code)) => {
                let stderr = self.capture_stderr(stderr_rx).await;
                warn!(exit_code = code, stderr = %stderr.trim_end(), "scan process failed");
                self.status.set_exit_code(Some(code));
                self.status.set_stderr(stderr);
                self.status.set_state(LifecycleState::Failed);
                Some(code)
            }
            None | Some(ChildExit::Indeterminate) => {
                self.status.set_exit_code(None);
                self.status.set_state(LifecycleState::Cancelled);
                info!("scan process ended without an exit status; cancelled");
                None
            }
        }
    }

    async fn capture_stderr(&self, stderr_rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        let mut captured = String::new();

        match self.settings.stderr_capture {
            StderrCapture::BestEffort => {
                while let Ok(line) = stderr_rx.try_recv() {
                    captured.push_str(&line);
                }
                if captured.is_empty() {
                    if let Ok(Some(line)) = timeout(self.settings.stderr_wait, stderr_rx.recv()).await
                    {
                        captured.push_str(&line);
                        while let Ok(line) = stderr_rx.try_recv() {
                            captured.push_str(&line);
                        }
                    }
                }
            }
            StderrCapture::Complete => {
                while let Some(line) = stderr_rx.recv().await {
                    captured.push_str(&line);
                }
            }
        }

        captured
    }
}

/// Resolves once the flag is `true`; never resolves if the sender is gone.
async fn interrupted(flag: &mut watch::Receiver<bool>) {
    let closed = flag.wait_for(|set| *set).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
