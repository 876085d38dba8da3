//! CLI command handlers, one file per command.

mod config;
mod plan;
mod run;

pub use config::run_config;
pub use plan::run_plan;
pub use run::run_command;
