//! Structured diagnostics for harness runs.
//!
//! Two outputs: a compact terminal layer and a JSON-lines file at
//! `<run_dir>/harness.log.jsonl`. Events carry `table`, `seed`, `slot`,
//! `operation` and `failure` fields so a run can be sliced with `jq`.
//! This is separate from the replay log, which records subject calls only.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rowcheck_error::{Result, RowcheckError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// File name of the JSON-lines diagnostics log inside a run directory.
pub const LOG_FILE_NAME: &str = "harness.log.jsonl";

/// Returned by [`init_logging`]; keep it alive for the whole run.
#[derive(Debug)]
pub struct LogGuard {
    pub log_path: PathBuf,
}

/// `MakeWriter` that serializes events into one shared file.
#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<File>>,
}

impl SharedFileWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileGuard {
            guard: self.file.lock(),
        }
    }
}

struct SharedFileGuard<'a> {
    guard: MutexGuard<'a, File>,
}

impl Write for SharedFileGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.guard.flush()
    }
}

fn default_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber. `RUST_LOG` overrides the level;
/// otherwise `verbose` selects `debug` over `info`.
///
/// Fails if the run directory or log file cannot be created, or if a global
/// subscriber is already installed.
pub fn init_logging(run_dir: &Path, verbose: bool) -> Result<LogGuard> {
    std::fs::create_dir_all(run_dir)?;
    let log_path = run_dir.join(LOG_FILE_NAME);
    let file = File::create(&log_path)?;

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(SharedFileWriter::new(file))
        .with_target(true)
        .with_thread_names(true);

    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(terminal_layer)
        .with(json_layer)
        .try_init()
        .map_err(|err| RowcheckError::internal(format!("logging already set up: {err}")))?;

    Ok(LogGuard { log_path })
}

/// Terminal-only logging routed through the test harness's capture.
/// Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(default_filter(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_test_writer()
                .compact(),
        )
        .try_init();
}
