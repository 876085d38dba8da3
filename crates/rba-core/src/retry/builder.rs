//! Fluent, validated construction of [`BackoffStrategy`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use super::classify::{Classifier, ErrorKind, FailureDescriptor, MatchCriteria, Predicate};
use super::error::BoxError;
use super::policy::{Backoff, WaitFn};
use super::strategy::{BackoffStrategy, FallbackOp, OnRetryAction};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Invalid strategy configuration, reported by `build()` rather than at use time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("exponential base must be at least 1")]
    ZeroBase,
    #[error("exponential time unit must be non-zero")]
    ZeroUnit,
    #[error("max_retries must be >= 0, got {0}")]
    NegativeRetries(i64),
    #[error("`{0}` only applies to exponential strategies")]
    NotExponential(&'static str),
    #[error("unknown backoff policy `{0}` (expected \"exponential\" or \"immediate\")")]
    UnknownPolicy(String),
}

enum Policy {
    Immediate,
    Exponential,
    Custom(WaitFn),
}

pub struct StrategyBuilder<E> {
    policy: Policy,
    name: Option<String>,
    criteria: MatchCriteria,
    predicate: Option<Predicate<E>>,
    max_retries: u32,
    base: Option<u32>,
    unit: Option<Duration>,
    max_delay: Option<Duration>,
    on_retry: Option<OnRetryAction<E>>,
    fallback: Option<FallbackOp>,
}

impl<E> BackoffStrategy<E> {
    /// `base^attempt` seconds between retries (base 2, 3 retries by default).
    pub fn exponential() -> StrategyBuilder<E> {
        StrategyBuilder::new(Policy::Exponential)
    }

    /// Retry without waiting.
    pub fn immediate() -> StrategyBuilder<E> {
        StrategyBuilder::new(Policy::Immediate)
    }

    /// Wait according to a caller-supplied function of the attempt number.
    pub fn custom<F>(wait: F) -> StrategyBuilder<E>
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        StrategyBuilder::new(Policy::Custom(Arc::new(wait)))
    }
}

impl<E> StrategyBuilder<E> {
    fn new(policy: Policy) -> Self {
        Self {
            policy,
            name: None,
            criteria: MatchCriteria::default(),
            predicate: None,
            max_retries: DEFAULT_MAX_RETRIES,
            base: None,
            unit: None,
            max_delay: None,
            on_retry: None,
            fallback: None,
        }
    }

    /// Label used in logs and in [`RetryError`](super::RetryError). Defaults to the policy name.
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Claim every failure *outside* the configured kinds and codes.
    pub fn exclusive(mut self) -> Self {
        self.criteria.exclusive = true;
        self
    }

    pub fn add_error_kind(mut self, kind: impl Into<ErrorKind>) -> Self {
        self.criteria.error_kinds.insert(kind.into());
        self
    }

    pub fn set_error_kinds<I, K>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ErrorKind>,
    {
        self.criteria.error_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_status_code(mut self, code: u16) -> Self {
        self.criteria.status_codes.insert(code);
        self
    }

    pub fn set_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.criteria.status_codes = codes.into_iter().collect();
        self
    }

    /// Replace kind/code matching entirely.
    pub fn set_custom_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FailureDescriptor<'_, E>) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn set_on_retry_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&E, u32) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(action));
        self
    }

    pub fn set_fallback_operation<F, Fut>(mut self, op: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<String>, BoxError>> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move || op().boxed()));
        self
    }

    pub fn set_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn set_base(mut self, base: u32) -> Self {
        self.base = Some(base);
        self
    }

    /// Length of one exponential time unit (one second by default).
    pub fn set_unit(mut self, unit: Duration) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn set_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn build(self) -> Result<BackoffStrategy<E>, BuildError> {
        let backoff = match self.policy {
            Policy::Exponential => {
                let base = self.base.unwrap_or(Backoff::DEFAULT_BASE);
                if base == 0 {
                    return Err(BuildError::ZeroBase);
                }
                let unit = self.unit.unwrap_or(Backoff::DEFAULT_UNIT);
                if unit.is_zero() {
                    return Err(BuildError::ZeroUnit);
                }
                Backoff::Exponential {
                    base,
                    unit,
                    max_delay: self.max_delay,
                }
            }
            Policy::Immediate | Policy::Custom(_) => {
                if self.base.is_some() {
                    return Err(BuildError::NotExponential("base"));
                }
                if self.unit.is_some() {
                    return Err(BuildError::NotExponential("unit"));
                }
                if self.max_delay.is_some() {
                    return Err(BuildError::NotExponential("max_delay"));
                }
                match self.policy {
                    Policy::Custom(wait) => Backoff::Custom(wait),
                    _ => Backoff::Immediate,
                }
            }
        };

        let classifier = match self.predicate {
            Some(predicate) => Classifier::Custom(predicate),
            None => Classifier::Criteria(self.criteria),
        };

        Ok(BackoffStrategy {
            name: self.name.unwrap_or_else(|| backoff.name().to_string()),
            classifier,
            backoff,
            max_retries: self.max_retries,
            on_retry: self.on_retry,
            fallback: self.fallback,
            logging_enabled: false,
        })
    }
}
