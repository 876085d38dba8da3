//! Arbitrates an ordered set of strategies over one asynchronous operation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::classify::Classify;
use super::error::RetryError;
use super::run::{Invocation, RunReport};
use super::strategy::BackoffStrategy;

/// What to do when a strategy's on-retry action returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackFailure {
    /// Stop retrying; surface [`RetryError::Callback`] wrapping both errors.
    #[default]
    Abort,
    /// Log the callback error and keep retrying.
    Ignore,
}

/// Result of [`RetryArbiter::run_with_report`].
#[derive(Debug)]
pub struct RunOutcome<T, E> {
    pub result: Result<T, RetryError<E>>,
    pub report: RunReport,
}

/// Ordered strategies plus global settings. Cheap to clone; every `run*`
/// call gets its own attempt counters, so clones can run concurrently.
pub struct RetryArbiter<E> {
    strategies: Arc<[BackoffStrategy<E>]>,
    logging_enabled: bool,
    callback_failure: CallbackFailure,
}

impl<E> RetryArbiter<E> {
    pub fn builder() -> ArbiterBuilder<E> {
        ArbiterBuilder::default()
    }

    /// Strategies in evaluation order.
    pub fn strategies(&self) -> &[BackoffStrategy<E>] {
        &self.strategies
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    pub fn callback_failure(&self) -> CallbackFailure {
        self.callback_failure
    }
}

impl<E> RetryArbiter<E>
where
    E: Classify + fmt::Display,
{
    /// Run `op` until it succeeds or arbitration declares a terminal failure.
    ///
    /// `op` is called once per attempt. Dropping the returned future cancels
    /// pending waits and fallbacks.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Invocation::new(self).drive(op).await
    }

    /// Like [`run`](Self::run), but stops with [`RetryError::Cancelled`] as
    /// soon as `token` fires, whether the operation, a wait or a fallback is
    /// pending.
    pub async fn run_cancellable<T, F, Fut>(
        &self,
        op: F,
        token: &CancellationToken,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut invocation = Invocation::new(self);
        let settled = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = invocation.drive(op) => Some(result),
        };
        match settled {
            Some(result) => result,
            None => {
                if self.logging_enabled {
                    tracing::debug!(attempts = invocation.attempts(), "retry cancelled");
                }
                Err(RetryError::Cancelled {
                    attempts: invocation.attempts(),
                })
            }
        }
    }

    /// Like [`run`](Self::run), also reporting attempts, claims and time waited.
    pub async fn run_with_report<T, F, Fut>(&self, op: F) -> RunOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut invocation = Invocation::new(self);
        let result = invocation.drive(op).await;
        RunOutcome {
            result,
            report: invocation.report(),
        }
    }
}

impl<E> Clone for RetryArbiter<E> {
    fn clone(&self) -> Self {
        Self {
            strategies: Arc::clone(&self.strategies),
            logging_enabled: self.logging_enabled,
            callback_failure: self.callback_failure,
        }
    }
}

impl<E> fmt::Debug for RetryArbiter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryArbiter")
            .field("strategies", &self.strategies)
            .field("logging_enabled", &self.logging_enabled)
            .field("callback_failure", &self.callback_failure)
            .finish()
    }
}

pub struct ArbiterBuilder<E> {
    strategies: Vec<BackoffStrategy<E>>,
    logging_enabled: bool,
    callback_failure: CallbackFailure,
}

impl<E> Default for ArbiterBuilder<E> {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
            logging_enabled: false,
            callback_failure: CallbackFailure::default(),
        }
    }
}

impl<E> ArbiterBuilder<E> {
    pub fn add_strategy(mut self, strategy: BackoffStrategy<E>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn set_strategies(mut self, strategies: impl IntoIterator<Item = BackoffStrategy<E>>) -> Self {
        self.strategies = strategies.into_iter().collect();
        self
    }

    pub fn set_logging_enabled(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    pub fn on_callback_failure(mut self, policy: CallbackFailure) -> Self {
        self.callback_failure = policy;
        self
    }

    /// Freeze the configuration. The logging flag is copied into every strategy.
    pub fn build(self) -> RetryArbiter<E> {
        let logging_enabled = self.logging_enabled;
        let strategies: Vec<_> = self
            .strategies
            .into_iter()
            .map(|mut s| {
                s.set_logging_enabled(logging_enabled);
                s
            })
            .collect();
        RetryArbiter {
            strategies: strategies.into(),
            logging_enabled,
            callback_failure: self.callback_failure,
        }
    }
}
