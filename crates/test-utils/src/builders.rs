#![allow(dead_code)]

use std::time::Duration;

use scanproc::config::ScanSettings;
use scanproc::exec::ChildExit;
use scanproc::types::StderrCapture;

use crate::fake_backend::FakeScript;

/// Builder for [`FakeScript`] to simplify test setup.
pub struct ScriptBuilder {
    script: FakeScript,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self {
            script: FakeScript::default(),
        }
    }

    /// Append a stdout line; a missing `\n` is added.
    pub fn stdout_line(mut self, line: &str) -> Self {
        self.script.stdout.push(terminated(line));
        self
    }

    pub fn stdout_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.script.stdout.push(terminated(line.as_ref()));
        }
        self
    }

    pub fn stderr_line(mut self, line: &str) -> Self {
        self.script.stderr.push(terminated(line));
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.script.exit = Some(ChildExit::Code(code));
        self
    }

    /// Exit without a status code, as if killed by a signal.
    pub fn killed_by_signal(mut self) -> Self {
        self.script.exit = Some(ChildExit::Indeterminate);
        self
    }

    /// Keep running until killed.
    pub fn never_exits(mut self) -> Self {
        self.script.exit = None;
        self
    }

    pub fn line_delay(mut self, delay: Duration) -> Self {
        self.script.line_delay = delay;
        self
    }

    pub fn exit_after(mut self, delay: Duration) -> Self {
        self.script.exit_after = delay;
        self
    }

    pub fn stderr_delay(mut self, delay: Duration) -> Self {
        self.script.stderr_delay = delay;
        self
    }

    pub fn build(self) -> FakeScript {
        self.script
    }
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn terminated(line: &str) -> String {
    if line.ends_with('\n') {
        line.to_string()
    } else {
        format!("{line}\n")
    }
}

/// Settings with short waits so tests finish quickly.
pub fn fast_settings() -> ScanSettings {
    ScanSettings {
        poll_interval: Duration::from_millis(50),
        stderr_wait: Duration::from_millis(200),
        ..ScanSettings::default()
    }
}

pub fn settings_with_capture(capture: StderrCapture) -> ScanSettings {
    ScanSettings {
        stderr_capture: capture,
        ..fast_settings()
    }
}
