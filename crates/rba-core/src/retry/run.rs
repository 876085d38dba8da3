//! Per-invocation retry loop: run, arbitrate the failure, wait, run again.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;

use super::arbiter::{CallbackFailure, RetryArbiter};
use super::classify::{Classify, FailureDescriptor};
use super::error::RetryError;
use super::policy::RetryDecision;
use super::strategy::{BackoffStrategy, RecoverySignal};

/// What happened during one top-level invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Operation attempts, including the first.
    pub attempts: u32,
    /// Failures each strategy claimed, in registration order.
    pub claims: Vec<(String, u32)>,
    /// Sum of the backoff waits that elapsed.
    pub waited: Duration,
}

impl RunReport {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn claims_of(&self, strategy: &str) -> Option<u32> {
        self.claims
            .iter()
            .find(|(name, _)| name == strategy)
            .map(|(_, n)| *n)
    }
}

/// Attempt counters for one invocation. Never shared, never stored on a strategy.
pub(super) struct Invocation<'a, E> {
    strategies: &'a [BackoffStrategy<E>],
    logging_enabled: bool,
    callback_failure: CallbackFailure,
    /// Claims so far, indexed like `strategies`.
    claims: Vec<u32>,
    attempts: u32,
    waited: Duration,
}

impl<'a, E> Invocation<'a, E> {
    pub(super) fn new(arbiter: &'a RetryArbiter<E>) -> Self {
        let strategies = arbiter.strategies();
        Self {
            strategies,
            logging_enabled: arbiter.logging_enabled(),
            callback_failure: arbiter.callback_failure(),
            claims: vec![0; strategies.len()],
            attempts: 0,
            waited: Duration::ZERO,
        }
    }

    pub(super) fn attempts(&self) -> u32 {
        self.attempts
    }

    fn record_wait(&mut self, wait: Duration) {
        self.waited = self.waited.saturating_add(wait);
    }

    pub(super) fn report(&self) -> RunReport {
        RunReport {
            attempts: self.attempts,
            claims: self
                .strategies
                .iter()
                .zip(&self.claims)
                .map(|(s, n)| (s.name().to_string(), *n))
                .collect(),
            waited: self.waited,
        }
    }
}

impl<'a, E> Invocation<'a, E>
where
    E: Classify + fmt::Display,
{
    pub(super) async fn drive<T, F, Fut>(&mut self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        loop {
            self.attempts += 1;
            match op().await {
                Ok(value) => {
                    if self.logging_enabled && self.attempts > 1 {
                        tracing::debug!(attempts = self.attempts, "operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let wait = self.arbitrate(error).await?;
                    tokio::time::sleep(wait).await;
                    self.record_wait(wait);
                }
            }
        }
    }

    /// Decide the fate of one failure: the wait before the next attempt, or a
    /// terminal error.
    async fn arbitrate(&mut self, error: E) -> Result<Duration, RetryError<E>> {
        let strategies = self.strategies;

        let descriptor = FailureDescriptor::new(&error);
        let mut claimed = Vec::new();
        for (i, strategy) in strategies.iter().enumerate() {
            let hit = strategy.is_applicable(&descriptor);
            if self.logging_enabled {
                tracing::debug!(
                    strategy = strategy.name(),
                    classifier = strategy.classifier().describe(),
                    kind = %descriptor.kind(),
                    status = ?descriptor.status_code(),
                    claimed = hit,
                    "checking failure against strategy"
                );
            }
            if hit {
                claimed.push(i);
            }
        }
        if claimed.is_empty() {
            if self.logging_enabled {
                tracing::debug!(kind = %descriptor.kind(), "no strategy claimed failure");
            }
            return Err(RetryError::NotRetryable(error));
        }

        // Fallbacks for this failure run together and all settle before the
        // counters move, so they run even on a strategy's last attempt.
        let recoveries: Vec<_> = join_all(claimed.iter().map(|&i| strategies[i].recover(&error)))
            .await
            .into_iter()
            .map(|r| {
                r.map(|signal| match signal {
                    RecoverySignal::Recovered(note) => Some(note),
                    RecoverySignal::Original(_) => None,
                })
            })
            .collect();
        for (&i, recovery) in claimed.iter().zip(recoveries) {
            match recovery {
                Ok(Some(note)) => {
                    if self.logging_enabled {
                        tracing::debug!(strategy = strategies[i].name(), %note, "fallback recovered");
                    }
                }
                Ok(None) => {}
                Err(cause) => {
                    return Err(RetryError::Fallback {
                        original: error,
                        strategy: strategies[i].name().to_string(),
                        cause,
                    });
                }
            }
        }

        // Every claimant counts this failure before any of them can veto it.
        for &i in &claimed {
            self.claims[i] += 1;
        }

        let mut planned = Vec::with_capacity(claimed.len());
        for &i in &claimed {
            let attempt = self.claims[i];
            match strategies[i].decide(attempt) {
                RetryDecision::RetryAfter(wait) => planned.push((i, attempt, wait)),
                RetryDecision::NoRetry => {
                    if self.logging_enabled {
                        tracing::warn!(
                            strategy = strategies[i].name(),
                            max_retries = strategies[i].max_retries(),
                            attempts = self.attempts,
                            "retry budget exhausted: {}",
                            error
                        );
                    }
                    return Err(RetryError::Exhausted {
                        original: error,
                        strategy: strategies[i].name().to_string(),
                        attempts: self.attempts,
                    });
                }
            }
        }

        for &(i, attempt, wait) in &planned {
            let strategy = &strategies[i];
            if self.logging_enabled {
                tracing::debug!(
                    strategy = strategy.name(),
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "found match, scheduling retry"
                );
            }
            if let Err(cause) = strategy.on_retry(&error, attempt) {
                match self.callback_failure {
                    CallbackFailure::Abort => {
                        return Err(RetryError::Callback {
                            original: error,
                            strategy: strategy.name().to_string(),
                            cause,
                        });
                    }
                    CallbackFailure::Ignore => {
                        tracing::warn!(strategy = strategy.name(), "on-retry action failed: {}", cause);
                    }
                }
            }
        }

        // Claimants wait side by side; the retry goes out when the longest wait ends.
        Ok(planned
            .iter()
            .map(|&(_, _, wait)| wait)
            .max()
            .unwrap_or_default())
    }
}
