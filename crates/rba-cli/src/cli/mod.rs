//! CLI for the RBA retry runner.

mod commands;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rba_core::config::{self, RbaConfig};
use rba_core::logging;
use std::path::PathBuf;
use std::time::Duration;

use commands::{run_command, run_config, run_plan};

/// Top-level CLI for the RBA retry runner.
#[derive(Debug, Parser)]
#[command(name = "rba")]
#[command(about = "RBA: run commands under composable retry/backoff strategies", long_about = None)]
pub struct Cli {
    /// Read strategies from this file instead of ~/.config/rba/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run a command, retrying failures claimed by the configured strategies.
    Run {
        /// Only use the named strategy (repeatable; default: all, in config order).
        #[arg(long = "strategy", value_name = "NAME")]
        strategies: Vec<String>,
        /// Kill an attempt that runs longer than SECS and treat it as a "timeout" failure.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Program and arguments, after `--`.
        #[arg(last = true, required = true, value_name = "CMD")]
        command: Vec<String>,
    },

    /// Print the wait schedule of each configured strategy.
    Plan {
        /// Only show the named strategy (repeatable).
        #[arg(long = "strategy", value_name = "NAME")]
        strategies: Vec<String>,
        /// Rows per strategy (default: its retry budget plus the give-up row).
        #[arg(long, value_name = "N")]
        attempts: Option<u32>,
    },

    /// Show the config file location and the effective configuration.
    Config,
}

impl CliCommand {
    /// Dispatch the parsed command; the returned value is the process exit code.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();
        let path = match cli.config {
            Some(path) => path,
            None => config::config_path()?,
        };
        let cfg = config::load_or_init_at(&path)?;

        // Log to the state dir; stderr if that is not writable.
        if logging::init_logging(cfg.logging).is_err() {
            logging::init_logging_stderr(cfg.logging);
        }
        tracing::debug!("loaded config from {}: {:?}", path.display(), cfg);

        match cli.command {
            CliCommand::Run {
                strategies,
                timeout,
                command,
            } => {
                let cfg = select_strategies(&cfg, &strategies)?;
                run_command(&cfg, &command, timeout.map(Duration::from_secs)).await
            }
            CliCommand::Plan {
                strategies,
                attempts,
            } => {
                run_plan(&select_strategies(&cfg, &strategies)?, attempts)?;
                Ok(0)
            }
            CliCommand::Config => {
                run_config(&cfg, &path)?;
                Ok(0)
            }
        }
    }
}

/// Narrow `cfg` to the named strategies, in the order given. No names keeps all.
fn select_strategies(cfg: &RbaConfig, names: &[String]) -> Result<RbaConfig> {
    if names.is_empty() {
        return Ok(cfg.clone());
    }
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match cfg.strategy(name) {
            Some(s) => selected.push(s.clone()),
            None => bail!("no strategy named `{}` in config", name),
        }
    }
    Ok(RbaConfig {
        strategies: selected,
        ..cfg.clone()
    })
}

#[cfg(test)]
mod tests;
