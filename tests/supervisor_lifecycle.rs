// tests/supervisor_lifecycle.rs

mod common;
use crate::common::{TestResult, fake_scan, init_tracing, with_timeout};

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scanproc::config::RunConfiguration;
use scanproc::errors::ScanError;
use scanproc::process::ScanProcess;
use scanproc::types::{LifecycleState, StderrCapture};
use scanproc_test_utils::builders::{ScriptBuilder, fast_settings, settings_with_capture};
use scanproc_test_utils::fixtures::{full_scan, host_block, nmaprun, taskprogress};
use scanproc_test_utils::FakeBackend;

#[tokio::test]
async fn successful_scan_is_done_and_keeps_every_line() -> TestResult {
    init_tracing();

    let lines = full_scan();
    let (mut scan, _backend) = fake_scan(ScriptBuilder::new().stdout_lines(&lines).build());

    let code = with_timeout(scan.run()).await?;

    assert_eq!(code, Some(0));
    assert_eq!(scan.state(), LifecycleState::Done);
    assert!(scan.is_successful());
    assert!(scan.has_terminated());
    assert!(!scan.is_running());
    assert_eq!(scan.exit_code(), Some(0));

    assert_eq!(scan.percent(), "100");
    assert_eq!(scan.etc(), "00:00:50");
    assert_eq!(scan.start_time(), "1700000000");
    assert_eq!(scan.version(), "7.94");
    assert_eq!(scan.end_time(), "1700000042");
    assert_eq!(scan.elapsed(), "42.00");
    assert!(scan.summary().contains("1 host up"));

    let expected: String = lines.iter().map(|l| format!("{l}\n")).collect();
    assert_eq!(scan.stdout(), expected);
    assert_eq!(scan.stderr(), "");
    Ok(())
}

#[tokio::test]
async fn exit_zero_forces_full_progress_without_markers() -> TestResult {
    init_tracing();

    let (mut scan, _backend) = fake_scan(ScriptBuilder::new().stdout_lines(host_block()).build());

    with_timeout(scan.run()).await?;

    assert_eq!(scan.state(), LifecycleState::Done);
    assert_eq!(scan.percent(), "100");
    assert_eq!(scan.etc(), "0");
    assert_eq!(scan.start_time(), "");
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_is_failed_with_stderr() -> TestResult {
    init_tracing();

    let script = ScriptBuilder::new()
        .stdout_line(&nmaprun("1700000000", "7.94"))
        .stderr_line("Failed to resolve \"nosuchhost.invalid\".")
        .stderr_line("WARNING: No targets were specified, so 0 hosts scanned.")
        .exit_code(1)
        .build();
    let (mut scan, _backend) = fake_scan(script);

    let code = with_timeout(scan.run()).await?;

    assert_eq!(code, Some(1));
    assert_eq!(scan.state(), LifecycleState::Failed);
    assert!(scan.has_failed());
    assert!(!scan.is_successful());
    assert!(scan.stderr().contains("Failed to resolve"));
    // Progress is not forced on failure.
    assert_eq!(scan.percent(), "0");
    assert_eq!(scan.version(), "7.94");
    Ok(())
}

#[tokio::test]
async fn best_effort_stderr_misses_late_output() -> TestResult {
    init_tracing();

    let script = ScriptBuilder::new()
        .stderr_line("late complaint")
        .stderr_delay(Duration::from_millis(1500))
        .exit_code(2)
        .build();
    let backend = FakeBackend::new(script);
    let mut scan = ScanProcess::builder(RunConfiguration::new("127.0.0.1", "-sT")?)
        .settings(settings_with_capture(StderrCapture::BestEffort))
        .backend(backend)
        .build()?;

    with_timeout(scan.run()).await?;

    assert_eq!(scan.state(), LifecycleState::Failed);
    assert_eq!(scan.stderr(), "");
    Ok(())
}

#[tokio::test]
async fn complete_stderr_waits_for_the_stream_to_close() -> TestResult {
    init_tracing();

    let script = ScriptBuilder::new()
        .stderr_line("late complaint")
        .stderr_delay(Duration::from_millis(500))
        .exit_code(2)
        .build();
    let backend = FakeBackend::new(script);
    let mut scan = ScanProcess::builder(RunConfiguration::new("127.0.0.1", "-sT")?)
        .settings(settings_with_capture(StderrCapture::Complete))
        .backend(backend)
        .build()?;

    with_timeout(scan.run()).await?;

    assert_eq!(scan.state(), LifecycleState::Failed);
    assert_eq!(scan.stderr(), "late complaint\n");
    Ok(())
}

#[tokio::test]
async fn missing_exit_status_is_cancelled() -> TestResult {
    init_tracing();

    let script = ScriptBuilder::new()
        .stdout_line(&taskprogress("10", "1700000100"))
        .stderr_line("ignored")
        .killed_by_signal()
        .build();
    let (mut scan, _backend) = fake_scan(script);

    let code = with_timeout(scan.run()).await?;

    assert_eq!(code, None);
    assert_eq!(scan.state(), LifecycleState::Cancelled);
    assert!(scan.has_terminated());
    assert!(!scan.has_failed());
    assert_eq!(scan.exit_code(), None);
    assert_eq!(scan.percent(), "10");
    assert_eq!(scan.stderr(), "");
    Ok(())
}

#[tokio::test]
async fn observer_runs_once_per_chunk_with_a_marker() -> TestResult {
    init_tracing();

    let lines = full_scan();
    let (mut scan, _backend) = fake_scan(ScriptBuilder::new().stdout_lines(&lines).build());

    let calls: Arc<Mutex<Vec<(String, String, LifecycleState)>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let calls = Arc::clone(&calls);
        scan.set_observer(move |status, chunk| {
            calls
                .lock()
                .unwrap()
                .push((chunk.to_string(), status.progress().progress, status.state()));
        });
    }

    with_timeout(scan.run()).await?;

    let calls = calls.lock().unwrap().clone();
    let chunks: Vec<&str> = calls.iter().map(|(chunk, _, _)| chunk.as_str()).collect();
    assert_eq!(
        chunks,
        vec![
            format!("{}\n", lines[1]),
            format!("{}\n", lines[2]),
            format!("{}\n", lines[3]),
            format!("{}\n", lines[9]),
        ]
    );
    // The snapshot already reflects the chunk when the observer runs.
    assert_eq!(calls[1].1, "42");
    assert_eq!(calls[2].1, "55");
    assert!(calls.iter().all(|(_, _, state)| *state == LifecycleState::Running));
    Ok(())
}

#[tokio::test]
async fn observer_is_not_called_without_markers() -> TestResult {
    init_tracing();

    let (mut scan, _backend) = fake_scan(
        ScriptBuilder::new()
            .stdout_lines(host_block())
            .stdout_line("<taskprogress task=\"Connect Scan\" perc")
            .build(),
    );
    let calls = Arc::new(Mutex::new(0usize));
    {
        let calls = Arc::clone(&calls);
        scan.set_observer(move |_, _| *calls.lock().unwrap() += 1);
    }

    with_timeout(scan.run()).await?;

    assert_eq!(*calls.lock().unwrap(), 0);
    assert!(scan.stdout().contains("perc\n"));
    Ok(())
}

#[tokio::test]
async fn event_subscriber_gets_every_marker_chunk() -> TestResult {
    init_tracing();

    let (mut scan, _backend) = fake_scan(ScriptBuilder::new().stdout_lines(full_scan()).build());
    let mut events = scan.subscribe_events();

    with_timeout(scan.run()).await?;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(received.len(), 4);
    assert!(received[0].chunk.starts_with("<nmaprun"));
    assert_eq!(received[1].progress.progress, "42");
    assert_eq!(received[2].progress.etc, "00:00:50");
    assert_eq!(received[3].progress.elapsed, "42.00");
    Ok(())
}

#[tokio::test]
async fn second_run_starts_from_clean_state() -> TestResult {
    init_tracing();

    let (mut scan, backend) = fake_scan(ScriptBuilder::new().stdout_lines(full_scan()).build());
    with_timeout(scan.run()).await?;
    assert_eq!(scan.state(), LifecycleState::Done);

    backend.set_script(
        ScriptBuilder::new()
            .stdout_lines(host_block())
            .stderr_line("second run broke")
            .exit_code(3)
            .build(),
    );
    let code = with_timeout(scan.run()).await?;

    assert_eq!(code, Some(3));
    assert_eq!(scan.state(), LifecycleState::Failed);
    assert!(!scan.stdout().contains("<nmaprun"));
    assert_eq!(scan.start_time(), "");
    assert_eq!(scan.end_time(), "");
    assert_eq!(scan.version(), "");
    assert_eq!(scan.summary(), "");
    assert_eq!(scan.percent(), "0");
    assert_eq!(scan.stderr(), "second run broke\n");
    assert_eq!(backend.spawned().len(), 2);
    Ok(())
}

#[tokio::test]
async fn spawn_error_marks_run_failed() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new(ScriptBuilder::new().build())
        .failing_spawn(io::ErrorKind::PermissionDenied);
    let mut scan = ScanProcess::builder(RunConfiguration::new("127.0.0.1", "-sT")?)
        .settings(fast_settings())
        .backend(backend)
        .build()?;

    let err = scan.run().await.unwrap_err();

    assert!(matches!(err, ScanError::Spawn { ref program, .. } if program == "/usr/bin/nmap"));
    assert_eq!(scan.state(), LifecycleState::Failed);
    assert_eq!(scan.exit_code(), None);
    Ok(())
}

#[tokio::test]
async fn missing_binary_fails_at_build() -> TestResult {
    init_tracing();

    let backend = FakeBackend::new(ScriptBuilder::new().build()).without_program("nmap");
    let result = ScanProcess::builder(RunConfiguration::new("127.0.0.1", "-sT")?)
        .backend(backend.clone())
        .build();

    assert!(matches!(result, Err(ScanError::Environment(_))));
    assert!(backend.spawned().is_empty());
    Ok(())
}

#[tokio::test]
async fn interrupt_cancels_and_kills_a_running_scan() -> TestResult {
    init_tracing();

    let script = ScriptBuilder::new()
        .stdout_line(&nmaprun("1700000000", "7.94"))
        .stdout_line(&taskprogress("3.5", "1700009999"))
        .never_exits()
        .build();
    let (mut scan, backend) = fake_scan(script);

    let handle = scan.interrupt_handle();
    let mut monitor = scan.monitor();
    tokio::spawn(async move {
        // Interrupt once the first progress report is visible.
        while let Some(progress) = monitor.progress_changed().await {
            if progress.progress == "3.5" {
                handle.interrupt();
                break;
            }
        }
    });

    let code = with_timeout(scan.run()).await?;

    assert_eq!(code, None);
    assert_eq!(scan.state(), LifecycleState::Cancelled);
    assert_eq!(scan.percent(), "3.5");
    assert_eq!(backend.kill_count(), 1);
    Ok(())
}

#[tokio::test]
async fn monitor_observes_the_run_from_another_task() -> TestResult {
    init_tracing();

    let script = ScriptBuilder::new()
        .stdout_lines(full_scan())
        .line_delay(Duration::from_millis(5))
        .exit_after(Duration::from_millis(200))
        .build();
    let (mut scan, _backend) = fake_scan(script);

    let mut monitor = scan.monitor();
    assert_eq!(monitor.state(), LifecycleState::Ready);

    let watcher = tokio::spawn(async move {
        let state = monitor.wait_until_terminated().await;
        (state, monitor.progress())
    });

    with_timeout(scan.run()).await?;
    let (state, progress) = with_timeout(watcher).await?;

    assert_eq!(state, LifecycleState::Done);
    assert_eq!(progress.progress, "100");
    assert_eq!(progress.version, "7.94");
    Ok(())
}
