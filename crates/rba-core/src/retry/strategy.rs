//! A single backoff strategy: what it claims, how long it waits, how often.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use super::classify::{Classifier, FailureDescriptor};
use super::error::BoxError;
use super::policy::{Backoff, RetryDecision};

/// Side effect run once per retry a strategy claims: `(error, attempt)`.
pub type OnRetryAction<E> = Arc<dyn Fn(&E, u32) -> Result<(), BoxError> + Send + Sync>;

/// Recovery step run before the wait (e.g. refresh a credential).
///
/// `Ok(Some(note))` reports a recovery, `Ok(None)` means nothing was produced.
pub type FallbackOp =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Option<String>, BoxError>> + Send + Sync>;

/// Outcome of a fallback step for one claimed failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySignal<'a, E> {
    /// The fallback produced a value.
    Recovered(String),
    /// No fallback, or it completed empty: the original error stands in.
    Original(&'a E),
}

/// Immutable retry policy unit. Built with [`StrategyBuilder`](super::StrategyBuilder).
///
/// Holds no per-invocation state, so one instance can serve any number of
/// concurrent invocations.
pub struct BackoffStrategy<E> {
    pub(super) name: String,
    pub(super) classifier: Classifier<E>,
    pub(super) backoff: Backoff,
    pub(super) max_retries: u32,
    pub(super) on_retry: Option<OnRetryAction<E>>,
    pub(super) fallback: Option<FallbackOp>,
    pub(super) logging_enabled: bool,
}

impl<E> BackoffStrategy<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classifier(&self) -> &Classifier<E> {
        &self.classifier
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn is_applicable(&self, descriptor: &FailureDescriptor<'_, E>) -> bool {
        self.classifier.matches(descriptor)
    }

    pub fn compute_wait(&self, attempt: u32) -> Duration {
        self.backoff.wait(attempt)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Attempts `1..=max_retries` wait and retry; anything later is terminal.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt > self.max_retries {
            RetryDecision::NoRetry
        } else {
            RetryDecision::RetryAfter(self.compute_wait(attempt))
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    pub(super) fn set_logging_enabled(&mut self, enabled: bool) {
        self.logging_enabled = enabled;
    }

    /// Run the fallback, if any, for a failure this strategy claimed.
    pub async fn recover<'a>(&self, original: &'a E) -> Result<RecoverySignal<'a, E>, BoxError> {
        let Some(fallback) = &self.fallback else {
            return Ok(RecoverySignal::Original(original));
        };
        if self.logging_enabled {
            tracing::debug!(strategy = %self.name, "invoking fallback operation");
        }
        match fallback().await? {
            Some(note) => Ok(RecoverySignal::Recovered(note)),
            None => Ok(RecoverySignal::Original(original)),
        }
    }
}

impl<E: fmt::Display> BackoffStrategy<E> {
    /// Invoke the on-retry action, or the default log line when none is set.
    pub fn on_retry(&self, error: &E, attempt: u32) -> Result<(), BoxError> {
        match &self.on_retry {
            Some(action) => action(error, attempt),
            None => {
                tracing::info!(strategy = %self.name, "{} occurred on {} retry", error, attempt);
                Ok(())
            }
        }
    }
}

impl<E> Clone for BackoffStrategy<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            classifier: self.classifier.clone(),
            backoff: self.backoff.clone(),
            max_retries: self.max_retries,
            on_retry: self.on_retry.clone(),
            fallback: self.fallback.clone(),
            logging_enabled: self.logging_enabled,
        }
    }
}

impl<E> fmt::Debug for BackoffStrategy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffStrategy")
            .field("name", &self.name)
            .field("classifier", &self.classifier)
            .field("backoff", &self.backoff)
            .field("max_retries", &self.max_retries)
            .field("on_retry", &self.on_retry.is_some())
            .field("fallback", &self.fallback.is_some())
            .field("logging_enabled", &self.logging_enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::testing::TestError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn decide_is_terminal_after_budget() {
        let s = BackoffStrategy::<TestError>::exponential()
            .add_status_code(503)
            .set_max_retries(2)
            .build()
            .unwrap();
        assert_eq!(s.decide(1), RetryDecision::RetryAfter(Duration::from_secs(2)));
        assert_eq!(s.decide(2), RetryDecision::RetryAfter(Duration::from_secs(4)));
        assert_eq!(s.decide(3), RetryDecision::NoRetry);
    }

    #[test]
    fn zero_budget_is_terminal_on_first_claim() {
        let s = BackoffStrategy::<TestError>::immediate()
            .add_error_kind("timeout")
            .set_max_retries(0)
            .build()
            .unwrap();
        assert_eq!(s.decide(1), RetryDecision::NoRetry);
    }

    #[test]
    fn custom_on_retry_action_receives_error_and_attempt() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = Arc::clone(&seen);
        let s = BackoffStrategy::<TestError>::immediate()
            .add_error_kind("timeout")
            .set_on_retry_action(move |err, attempt| {
                assert_eq!(err.kind, "timeout");
                seen2.fetch_add(attempt, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();
        s.on_retry(&TestError::of("timeout"), 1).unwrap();
        s.on_retry(&TestError::of("timeout"), 2).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fallback_value_becomes_recovery_signal() {
        let s = BackoffStrategy::<TestError>::exponential()
            .add_status_code(401)
            .set_fallback_operation(|| async { Ok::<_, BoxError>(Some("token refreshed".to_string())) })
            .build()
            .unwrap();
        let err = TestError::http(401);
        assert_eq!(
            s.recover(&err).await.unwrap(),
            RecoverySignal::Recovered("token refreshed".to_string())
        );
    }

    #[tokio::test]
    async fn empty_fallback_substitutes_original_error() {
        let s = BackoffStrategy::<TestError>::exponential()
            .add_status_code(401)
            .set_fallback_operation(|| async { Ok::<_, BoxError>(None) })
            .build()
            .unwrap();
        let err = TestError::http(401);
        assert_eq!(s.recover(&err).await.unwrap(), RecoverySignal::Original(&err));

        let plain = BackoffStrategy::<TestError>::immediate()
            .add_status_code(401)
            .build()
            .unwrap();
        assert!(!plain.has_fallback());
        assert_eq!(plain.recover(&err).await.unwrap(), RecoverySignal::Original(&err));
    }
}
