//! `rba config` – show where configuration lives and what is in effect.

use anyhow::Result;
use rba_core::config::RbaConfig;
use rba_core::logging;
use std::path::Path;

pub fn run_config(cfg: &RbaConfig, path: &Path) -> Result<()> {
    println!("# config: {}", path.display());
    match logging::log_path() {
        Ok(log) => println!("# log:    {}", log.display()),
        Err(e) => tracing::debug!("no log path: {:#}", e),
    }
    println!();
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
