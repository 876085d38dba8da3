//! `rba run` – run a command under the configured retry strategies.

use anyhow::{anyhow, Result};
use rba_core::config::RbaConfig;
use rba_core::retry::{Classify, ErrorKind, RetryError};
use std::fmt;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

const EXIT_TIMEOUT: i32 = 124;
const EXIT_NOT_STARTED: i32 = 127;
const EXIT_INTERRUPTED: i32 = 130;

/// Why one attempt of the wrapped command failed.
#[derive(Debug)]
pub(crate) enum CommandError {
    /// Non-zero exit; classified as kind `exit` with the code as status.
    Exit(i32),
    /// Terminated by a signal (number when known).
    Signal(Option<i32>),
    /// Spawning or waiting on the child failed.
    Io(io::Error),
    Timeout(Duration),
}

impl CommandError {
    fn exit_code(&self) -> i32 {
        match self {
            CommandError::Exit(code) => *code,
            CommandError::Signal(Some(sig)) => 128 + sig,
            CommandError::Signal(None) => 1,
            CommandError::Io(_) => EXIT_NOT_STARTED,
            CommandError::Timeout(_) => EXIT_TIMEOUT,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Exit(code) => write!(f, "command exited with status {}", code),
            CommandError::Signal(Some(sig)) => write!(f, "command killed by signal {}", sig),
            CommandError::Signal(None) => f.write_str("command killed by a signal"),
            CommandError::Io(e) => write!(f, "could not run command: {}", e),
            CommandError::Timeout(limit) => write!(f, "command timed out after {:?}", limit),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl Classify for CommandError {
    fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Exit(_) => ErrorKind::new("exit"),
            CommandError::Signal(_) => ErrorKind::new("signal"),
            CommandError::Io(_) => ErrorKind::new("io"),
            CommandError::Timeout(_) => ErrorKind::new("timeout"),
        }
    }

    fn status_code(&self) -> Option<u16> {
        match self {
            CommandError::Exit(code) => u16::try_from(*code).ok(),
            _ => None,
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

/// One attempt: spawn, wait (bounded by `timeout`), map the exit status.
async fn attempt(program: &str, args: &[String], timeout: Option<Duration>) -> Result<(), CommandError> {
    let mut child = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .spawn()
        .map_err(CommandError::Io)?;

    let status = match timeout {
        Some(limit) => {
            let waited = tokio::time::timeout(limit, child.wait()).await;
            match waited {
                Ok(status) => status.map_err(CommandError::Io)?,
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(CommandError::Timeout(limit));
                }
            }
        }
        None => child.wait().await.map_err(CommandError::Io)?,
    };

    if status.success() {
        Ok(())
    } else if let Some(code) = status.code() {
        Err(CommandError::Exit(code))
    } else {
        Err(CommandError::Signal(signal_of(&status)))
    }
}

/// Exit code `rba` should report for a terminal failure.
fn exit_code_of(err: &RetryError<CommandError>) -> i32 {
    err.original()
        .map(CommandError::exit_code)
        .unwrap_or(EXIT_INTERRUPTED)
}

fn describe(err: &RetryError<CommandError>) -> String {
    match err {
        RetryError::NotRetryable(e) => format!("{} (not retried)", e),
        RetryError::Exhausted {
            original,
            strategy,
            attempts,
        } => format!(
            "{}; giving up after {} attempts (strategy `{}`)",
            original, attempts, strategy
        ),
        other => other.to_string(),
    }
}

/// Run `command` until it succeeds or the arbiter gives up. Ctrl-C cancels
/// the current attempt or wait. Returns the exit code of the last attempt.
pub async fn run_command(cfg: &RbaConfig, command: &[String], timeout: Option<Duration>) -> Result<i32> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("no command given"))?;
    let arbiter = cfg.to_arbiter::<CommandError>()?;
    if arbiter.strategies().is_empty() {
        tracing::warn!("no strategies configured; failures will not be retried");
    }

    let token = CancellationToken::new();
    let interrupt = token.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    tracing::info!(program = %program, strategies = arbiter.strategies().len(), "running command");
    let result = arbiter
        .run_cancellable(|| attempt(program, args, timeout), &token)
        .await;
    ctrl_c.abort();

    match result {
        Ok(()) => Ok(0),
        Err(err) => {
            tracing::info!("command failed: {}", describe(&err));
            eprintln!("rba: {}", describe(&err));
            Ok(exit_code_of(&err))
        }
    }
}
