// tests/real_process.rs
//
// Runs `/bin/sh` with small scripts in place of the scanner so the real
// tokio backend (pipes, exit statuses, kill) is exercised end to end.

#![cfg(unix)]

mod common;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use scanproc::config::{RunConfiguration, ScanSettings};
use scanproc::process::ScanProcess;
use scanproc::types::{LifecycleState, StderrCapture};
use scanproc_test_utils::builders::fast_settings;

fn shell_scan(dir: &TempDir, body: &str) -> Result<ScanProcess, Box<dyn std::error::Error>> {
    let script = dir.path().join("scanner.sh");
    fs::write(&script, format!("#!/bin/sh\n{body}\n"))?;

    let settings = ScanSettings {
        binary: Path::new("/bin/sh").to_path_buf(),
        fixed_options: vec![script.to_string_lossy().to_string()],
        stderr_capture: StderrCapture::Complete,
        ..fast_settings()
    };
    Ok(ScanProcess::builder(RunConfiguration::new("127.0.0.1", "-sT")?)
        .settings(settings)
        .build()?)
}

#[tokio::test]
async fn shell_scan_exiting_zero_is_done() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let mut scan = shell_scan(
        &dir,
        r#"echo '<?xml version="1.0" encoding="UTF-8"?>'
echo '<nmaprun scanner="nmap" args="'"$*"'" start="1700000000" version="7.94">'
echo '<taskprogress task="Connect Scan" percent="50.00" etc="1700000100"/>'
echo '<runstats><finished time="1700000001" elapsed="1.00" summary="done" exit="success"/>'
echo '</runstats>'
echo '</nmaprun>'
exit 0"#,
    )?;

    let code = with_timeout(scan.run()).await?;

    assert_eq!(code, Some(0));
    assert_eq!(scan.state(), LifecycleState::Done);
    assert_eq!(scan.percent(), "100");
    assert_eq!(scan.etc(), "1700000100");
    assert_eq!(scan.start_time(), "1700000000");
    assert_eq!(scan.end_time(), "1700000001");
    assert_eq!(scan.summary(), "done");
    // The script sees the user options and targets as its arguments.
    assert!(scan.stdout().contains(r#"args="-sT 127.0.0.1""#));
    assert!(scan.stdout().ends_with("</nmaprun>\n"));
    Ok(())
}

#[tokio::test]
async fn shell_scan_exiting_non_zero_is_failed_with_stderr() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let mut scan = shell_scan(
        &dir,
        "echo 'Failed to resolve \"nosuchhost.invalid\".' >&2\nexit 255",
    )?;

    let code = with_timeout(scan.run()).await?;

    assert_eq!(code, Some(255));
    assert_eq!(scan.state(), LifecycleState::Failed);
    assert_eq!(scan.stderr(), "Failed to resolve \"nosuchhost.invalid\".\n");
    Ok(())
}

#[tokio::test]
async fn shell_scan_killed_by_signal_is_cancelled() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let mut scan = shell_scan(&dir, "echo 'partial'\nkill -9 $$")?;

    let code = with_timeout(scan.run()).await?;

    assert_eq!(code, None);
    assert_eq!(scan.state(), LifecycleState::Cancelled);
    assert_eq!(scan.exit_code(), None);
    Ok(())
}

#[tokio::test]
async fn interrupt_kills_a_long_running_shell_scan() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let mut scan = shell_scan(
        &dir,
        r#"echo '<nmaprun scanner="nmap" start="1700000000" version="7.94">'
exec sleep 30"#,
    )?;

    let handle = scan.interrupt_handle();
    let mut monitor = scan.monitor();
    tokio::spawn(async move {
        while let Some(progress) = monitor.progress_changed().await {
            if progress.start_time == "1700000000" {
                handle.interrupt();
                break;
            }
        }
    });

    let code = with_timeout(scan.run()).await?;

    assert_eq!(code, None);
    assert_eq!(scan.state(), LifecycleState::Cancelled);
    assert_eq!(scan.start_time(), "1700000000");
    Ok(())
}
