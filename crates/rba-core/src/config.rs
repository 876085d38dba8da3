use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::{BackoffStrategy, BuildError, CallbackFailure, RetryArbiter, DEFAULT_MAX_RETRIES};

/// One `[[strategy]]` table in config.toml.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Label shown in logs and errors; defaults to the policy name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// "exponential" or "immediate".
    pub policy: String,
    #[serde(default)]
    pub status_codes: Vec<u16>,
    #[serde(default)]
    pub error_kinds: Vec<String>,
    /// Claim failures outside `status_codes`/`error_kinds` instead of inside.
    #[serde(default)]
    pub exclusive: bool,
    /// Signed so a negative value is reported instead of failing to parse.
    #[serde(default = "default_max_retries")]
    pub max_retries: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<u32>,
    /// Exponential time unit in milliseconds (1000 when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_secs: Option<u64>,
}

fn default_max_retries() -> i64 {
    i64::from(DEFAULT_MAX_RETRIES)
}

impl StrategyConfig {
    /// Label the built strategy will carry.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.policy)
    }

    pub fn to_strategy<E>(&self) -> Result<BackoffStrategy<E>, BuildError> {
        if self.max_retries < 0 {
            return Err(BuildError::NegativeRetries(self.max_retries));
        }
        let mut builder = match self.policy.as_str() {
            "exponential" => BackoffStrategy::exponential(),
            "immediate" => BackoffStrategy::immediate(),
            other => return Err(BuildError::UnknownPolicy(other.to_string())),
        };

        builder = builder
            .set_max_retries(u32::try_from(self.max_retries).unwrap_or(u32::MAX))
            .set_status_codes(self.status_codes.iter().copied())
            .set_error_kinds(self.error_kinds.iter().cloned());
        if self.exclusive {
            builder = builder.exclusive();
        }
        if let Some(name) = &self.name {
            builder = builder.set_name(name.clone());
        }
        if let Some(base) = self.base {
            builder = builder.set_base(base);
        }
        if let Some(ms) = self.unit_ms {
            builder = builder.set_unit(Duration::from_millis(ms));
        }
        if let Some(secs) = self.max_delay_secs {
            builder = builder.set_max_delay(Duration::from_secs(secs));
        }
        builder.build()
    }
}

/// Global configuration loaded from `~/.config/rba/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbaConfig {
    /// Log each eligibility check, claim and exhaustion.
    #[serde(default)]
    pub logging: bool,
    #[serde(default)]
    pub on_callback_failure: CallbackFailure,
    /// Strategies in evaluation order.
    #[serde(default, rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

impl Default for RbaConfig {
    fn default() -> Self {
        Self {
            logging: false,
            on_callback_failure: CallbackFailure::Abort,
            strategies: vec![StrategyConfig {
                name: Some("transient".to_string()),
                policy: "exponential".to_string(),
                status_codes: (500..=504).collect(),
                // `exit` covers non-zero exits of commands run by `rba run`.
                error_kinds: vec!["timeout".to_string(), "io".to_string(), "exit".to_string()],
                exclusive: false,
                max_retries: default_max_retries(),
                base: Some(2),
                unit_ms: None,
                max_delay_secs: None,
            }],
        }
    }
}

impl RbaConfig {
    pub fn strategy(&self, name: &str) -> Option<&StrategyConfig> {
        self.strategies.iter().find(|s| s.display_name() == name)
    }

    pub fn to_arbiter<E>(&self) -> Result<RetryArbiter<E>, BuildError> {
        let strategies = self
            .strategies
            .iter()
            .map(StrategyConfig::to_strategy::<E>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RetryArbiter::builder()
            .set_strategies(strategies)
            .set_logging_enabled(self.logging)
            .on_callback_failure(self.on_callback_failure)
            .build())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rba")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

pub fn load_from_path(path: &Path) -> Result<RbaConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg: RbaConfig =
        toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from `path`, writing the default there first if the file is missing.
pub fn load_or_init_at(path: &Path) -> Result<RbaConfig> {
    if !path.exists() {
        let default_cfg = RbaConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(path)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RbaConfig> {
    load_or_init_at(&config_path()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = RbaConfig::default();
        assert!(!cfg.logging);
        assert_eq!(cfg.on_callback_failure, CallbackFailure::Abort);
        assert_eq!(cfg.strategies.len(), 1);
        let s = &cfg.strategies[0];
        assert_eq!(s.display_name(), "transient");
        assert_eq!(s.status_codes, vec![500, 501, 502, 503, 504]);
        assert_eq!(s.error_kinds, vec!["timeout", "io", "exit"]);
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.base, Some(2));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = RbaConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: RbaConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            logging = true
            on_callback_failure = "ignore"

            [[strategy]]
            name = "server-errors"
            policy = "exponential"
            status_codes = [500, 502, 503]
            error_kinds = ["timeout"]
            max_retries = 5
            base = 3
            unit_ms = 250
            max_delay_secs = 30

            [[strategy]]
            policy = "immediate"
            error_kinds = ["fatal"]
            exclusive = true
        "#;
        let cfg: RbaConfig = toml::from_str(toml).unwrap();
        assert!(cfg.logging);
        assert_eq!(cfg.on_callback_failure, CallbackFailure::Ignore);
        assert_eq!(cfg.strategies.len(), 2);
        assert_eq!(cfg.strategies[0].unit_ms, Some(250));
        let second = cfg.strategy("immediate").unwrap();
        assert!(second.exclusive);
        assert_eq!(second.max_retries, 3);
        assert!(second.status_codes.is_empty());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: RbaConfig = toml::from_str("").unwrap();
        assert!(!cfg.logging);
        assert_eq!(cfg.on_callback_failure, CallbackFailure::Abort);
        assert!(cfg.strategies.is_empty());
    }

    #[test]
    fn to_arbiter_keeps_order_and_settings() {
        let toml = r#"
            logging = true
            on_callback_failure = "ignore"

            [[strategy]]
            name = "slow"
            policy = "exponential"
            status_codes = [503]
            base = 3
            unit_ms = 100
            max_delay_secs = 1

            [[strategy]]
            policy = "immediate"
            error_kinds = ["TimedOut"]
            max_retries = 0
        "#;
        let cfg: RbaConfig = toml::from_str(toml).unwrap();
        let arbiter = cfg.to_arbiter::<std::io::Error>().unwrap();
        assert!(arbiter.logging_enabled());
        assert_eq!(arbiter.callback_failure(), CallbackFailure::Ignore);
        let names: Vec<_> = arbiter.strategies().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["slow", "immediate"]);
        assert_eq!(arbiter.strategies()[0].compute_wait(2), Duration::from_millis(900));
        assert_eq!(arbiter.strategies()[0].compute_wait(5), Duration::from_secs(1));
        assert_eq!(arbiter.strategies()[1].max_retries(), 0);
        assert!(arbiter.strategies().iter().all(|s| s.logging_enabled()));
    }

    #[test]
    fn invalid_strategies_are_rejected() {
        let mut s = RbaConfig::default().strategies.remove(0);
        s.max_retries = -1;
        assert_eq!(
            s.to_strategy::<std::io::Error>().unwrap_err(),
            BuildError::NegativeRetries(-1)
        );

        let mut s = RbaConfig::default().strategies.remove(0);
        s.policy = "linear".to_string();
        assert_eq!(
            s.to_strategy::<std::io::Error>().unwrap_err(),
            BuildError::UnknownPolicy("linear".to_string())
        );

        let mut s = RbaConfig::default().strategies.remove(0);
        s.policy = "immediate".to_string();
        assert_eq!(
            s.to_strategy::<std::io::Error>().unwrap_err(),
            BuildError::NotExponential("base")
        );
    }

    #[test]
    fn load_or_init_writes_default_then_reads_it_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, RbaConfig::default());

        fs::write(&path, "logging = true\n").unwrap();
        let loaded = load_or_init_at(&path).unwrap();
        assert!(loaded.logging);
        assert!(loaded.strategies.is_empty());
    }

    #[test]
    fn load_from_path_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[[strategy]]\nmax_retries = 2\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing config"));
    }
}
