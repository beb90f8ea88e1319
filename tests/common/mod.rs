#![allow(dead_code)]

pub use scanproc_test_utils::{init_tracing, with_timeout};

use scanproc::config::RunConfiguration;
use scanproc::process::ScanProcess;
use scanproc_test_utils::builders::fast_settings;
use scanproc_test_utils::{FakeBackend, FakeScript};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// `-sT` scan of 127.0.0.1 on a fake backend playing `script`.
///
/// Returns the backend clone so tests can inspect spawns and kills.
pub fn fake_scan(script: FakeScript) -> (ScanProcess, FakeBackend) {
    let backend = FakeBackend::new(script);
    let config = RunConfiguration::new("127.0.0.1", "-sT").expect("valid config");
    let scan = ScanProcess::builder(config)
        .settings(fast_settings())
        .backend(backend.clone())
        .build()
        .expect("fake backend resolves every program");
    (scan, backend)
}
