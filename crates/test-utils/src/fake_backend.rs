use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};

use scanproc::errors::{Result, ScanError};
use scanproc::exec::{ChildExit, CommandLine, OutputStream, ProcessBackend, ScanChild};

/// What a fake child prints and how it ends.
#[derive(Debug, Clone)]
pub struct FakeScript {
    /// Lines written to stdout, in order. Include the trailing `\n`.
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// `None` keeps the child alive until it is killed.
    pub exit: Option<ChildExit>,
    /// Pause before each stdout line.
    pub line_delay: Duration,
    /// Minimum lifetime of the child, counted from spawn.
    pub exit_after: Duration,
    /// Pause before stderr is written.
    pub stderr_delay: Duration,
}

impl Default for FakeScript {
    fn default() -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit: Some(ChildExit::Code(0)),
            line_delay: Duration::ZERO,
            exit_after: Duration::ZERO,
            stderr_delay: Duration::ZERO,
        }
    }
}

/// A backend that never touches the OS:
/// - programs resolve to `/usr/bin/<name>` unless marked missing,
/// - users exist only if registered,
/// - every spawn records its argv and plays the current [`FakeScript`].
#[derive(Clone)]
pub struct FakeBackend {
    script: Arc<Mutex<FakeScript>>,
    spawned: Arc<Mutex<Vec<Vec<String>>>>,
    kills: Arc<AtomicUsize>,
    users: Vec<String>,
    missing_programs: Vec<String>,
    spawn_error: Option<io::ErrorKind>,
}

impl FakeBackend {
    pub fn new(script: FakeScript) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            spawned: Arc::new(Mutex::new(Vec::new())),
            kills: Arc::new(AtomicUsize::new(0)),
            users: vec!["root".to_string()],
            missing_programs: Vec::new(),
            spawn_error: None,
        }
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.users.push(user.to_string());
        self
    }

    pub fn without_program(mut self, program: &str) -> Self {
        self.missing_programs.push(program.to_string());
        self
    }

    pub fn failing_spawn(mut self, kind: io::ErrorKind) -> Self {
        self.spawn_error = Some(kind);
        self
    }

    /// Script played by the next spawn.
    pub fn set_script(&self, script: FakeScript) {
        *self.script.lock().unwrap() = script;
    }

    /// Argv of every spawn so far.
    pub fn spawned(&self) -> Vec<Vec<String>> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

impl ProcessBackend for FakeBackend {
    fn resolve_program(&self, program: &Path) -> Result<PathBuf> {
        let name = program.to_string_lossy().to_string();
        if self.missing_programs.contains(&name) {
            return Err(ScanError::Environment(format!(
                "'{name}' is not installed or could not be found in system path"
            )));
        }
        if program.is_absolute() {
            Ok(program.to_path_buf())
        } else {
            Ok(Path::new("/usr/bin").join(program))
        }
    }

    fn user_exists(&self, user: &str) -> Result<bool> {
        Ok(self.users.iter().any(|u| u == user))
    }

    fn spawn(&self, command: &CommandLine) -> io::Result<Box<dyn ScanChild>> {
        self.spawned.lock().unwrap().push(command.argv());

        if let Some(kind) = self.spawn_error {
            return Err(io::Error::from(kind));
        }

        let script = self.script.lock().unwrap().clone();
        Ok(Box::new(FakeChild::start(script, Arc::clone(&self.kills))))
    }
}

pub struct FakeChild {
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
    exit: Option<ChildExit>,
    exits_at: Instant,
    stdout_done: watch::Receiver<bool>,
    killed: Arc<watch::Sender<bool>>,
    kills: Arc<AtomicUsize>,
}

impl FakeChild {
    fn start(script: FakeScript, kills: Arc<AtomicUsize>) -> Self {
        let (killed, _) = watch::channel(false);
        let killed = Arc::new(killed);
        let (done_tx, done_rx) = watch::channel(false);

        let (stdout_reader, mut stdout_writer) = tokio::io::duplex(64 * 1024);
        {
            let mut killed_rx = killed.subscribe();
            let hold_open = script.exit.is_none();
            let lines = script.stdout.clone();
            let delay = script.line_delay;
            tokio::spawn(async move {
                for line in lines {
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    let killed_now = *killed_rx.borrow();
                    if killed_now || stdout_writer.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                }
                done_tx.send_replace(true);
                if hold_open {
                    let _ = killed_rx.wait_for(|k| *k).await;
                }
                // Writer dropped here: the reader sees EOF.
            });
        }

        let (stderr_reader, mut stderr_writer) = tokio::io::duplex(64 * 1024);
        {
            let text: String = script.stderr.concat();
            let delay = script.stderr_delay;
            tokio::spawn(async move {
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                let _ = stderr_writer.write_all(text.as_bytes()).await;
            });
        }

        Self {
            stdout: Some(Box::new(stdout_reader)),
            stderr: Some(Box::new(stderr_reader)),
            exit: script.exit,
            exits_at: Instant::now() + script.exit_after,
            stdout_done: done_rx,
            killed,
            kills,
        }
    }
}

impl ScanChild for FakeChild {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    fn try_wait(&mut self) -> io::Result<Option<ChildExit>> {
        if *self.killed.borrow() {
            return Ok(Some(ChildExit::Indeterminate));
        }
        match self.exit {
            Some(exit) if *self.stdout_done.borrow() && Instant::now() >= self.exits_at => {
                Ok(Some(exit))
            }
            _ => Ok(None),
        }
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = io::Result<ChildExit>> + Send + '_>> {
        Box::pin(async move {
            loop {
                if let Some(exit) = self.try_wait()? {
                    return Ok(exit);
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
    }

    fn start_kill(&mut self) -> io::Result<()> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.killed.send_replace(true);
        Ok(())
    }

    fn id(&self) -> Option<u32> {
        None
    }
}
