//! Retry and backoff arbitration.
//!
//! A [`RetryArbiter`] owns an ordered list of [`BackoffStrategy`] values. When
//! the wrapped operation fails, every strategy is asked whether it claims the
//! failure; claimants run their fallback, advance their own attempt counter
//! and contribute a wait. An unclaimed failure, or a claimant out of budget,
//! ends the invocation with the original error.
//!
//! ```no_run
//! use rba_core::retry::{BackoffStrategy, Classify, ErrorKind, RetryArbiter};
//!
//! #[derive(Debug)]
//! struct HttpError(u16);
//!
//! impl std::fmt::Display for HttpError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "HTTP {}", self.0)
//!     }
//! }
//!
//! impl std::error::Error for HttpError {}
//!
//! impl Classify for HttpError {
//!     fn kind(&self) -> ErrorKind {
//!         ErrorKind::new("http")
//!     }
//!     fn status_code(&self) -> Option<u16> {
//!         Some(self.0)
//!     }
//! }
//!
//! # async fn fetch() -> Result<String, HttpError> { Err(HttpError(503)) }
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let arbiter = RetryArbiter::builder()
//!     .add_strategy(
//!         BackoffStrategy::exponential()
//!             .add_status_code(503)
//!             .set_max_retries(3)
//!             .build()?,
//!     )
//!     .build();
//! let body = arbiter.run(|| fetch()).await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

mod arbiter;
mod builder;
mod classify;
mod error;
mod policy;
mod run;
mod strategy;

pub use arbiter::{ArbiterBuilder, CallbackFailure, RetryArbiter, RunOutcome};
pub use builder::{BuildError, StrategyBuilder, DEFAULT_MAX_RETRIES};
pub use classify::{Classifier, Classify, ErrorKind, FailureDescriptor, MatchCriteria, Predicate};
pub use error::{BoxError, RetryError};
pub use policy::{Backoff, RetryDecision, WaitFn};
pub use run::RunReport;
pub use strategy::{BackoffStrategy, FallbackOp, OnRetryAction, RecoverySignal};

#[cfg(test)]
mod testing;
