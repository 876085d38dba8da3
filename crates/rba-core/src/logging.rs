//! Tracing setup: append to a log file under the XDG state dir, or stderr.
//!
//! The engine only emits its per-failure detail events when an arbiter has
//! logging enabled; the filter built here lets those events through in the
//! same case and keeps the core at `info` otherwise.

use anyhow::{anyhow, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(retry_events: bool) -> String {
    let core = if retry_events { "debug" } else { "info" };
    format!("info,rba_cli=debug,rba_core={}", core)
}

fn env_filter(retry_events: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(retry_events)))
}

/// Per-event writer; degrades to stderr when the log file handle can't be cloned.
enum LogSink {
    File(File),
    Stderr,
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct LogFile(File);

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogSink::File)
            .unwrap_or(LogSink::Stderr)
    }
}

/// `~/.local/state/rba/rba.log`, creating the directory if needed.
pub fn log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rba")?;
    let dir = xdg_dirs.get_state_home().join("rba");
    fs::create_dir_all(&dir)?;
    Ok(dir.join("rba.log"))
}

/// Install the global subscriber writing to [`log_path`]. `retry_events`
/// mirrors the arbiter's logging flag (config `logging = true`).
///
/// Errors leave no subscriber installed, so the caller can fall back to
/// [`init_logging_stderr`].
pub fn init_logging(retry_events: bool) -> Result<()> {
    let path = log_path()?;
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(retry_events))
        .with_writer(BoxMakeWriter::new(LogFile(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {}", e))?;

    tracing::info!(retry_events, "rba logging to {}", path.display());
    Ok(())
}

pub fn init_logging_stderr(retry_events: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(retry_events))
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
