//! Terminal outcomes of an arbitrated operation.

use std::error::Error;
use std::fmt;

/// Error type for user callbacks and fallback operations.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Why an arbitrated operation gave up.
///
/// `NotRetryable` and `Exhausted` display exactly like the original error so
/// callers see an ordinary failure; the retry context lives in the fields.
#[derive(Debug)]
pub enum RetryError<E> {
    /// No strategy claimed the error. No wait was applied.
    NotRetryable(E),
    /// A claiming strategy ran out of retries.
    Exhausted {
        original: E,
        strategy: String,
        /// Total attempts of the operation, including the first.
        attempts: u32,
    },
    /// An on-retry action failed and the arbiter aborts on callback failure.
    Callback {
        original: E,
        strategy: String,
        cause: BoxError,
    },
    /// A fallback operation returned an error.
    Fallback {
        original: E,
        strategy: String,
        cause: BoxError,
    },
    /// The cancellation token fired before the operation settled.
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// The error that triggered the terminal decision, if any.
    pub fn original(&self) -> Option<&E> {
        match self {
            RetryError::NotRetryable(original)
            | RetryError::Exhausted { original, .. }
            | RetryError::Callback { original, .. }
            | RetryError::Fallback { original, .. } => Some(original),
            RetryError::Cancelled { .. } => None,
        }
    }

    pub fn into_original(self) -> Option<E> {
        match self {
            RetryError::NotRetryable(original)
            | RetryError::Exhausted { original, .. }
            | RetryError::Callback { original, .. }
            | RetryError::Fallback { original, .. } => Some(original),
            RetryError::Cancelled { .. } => None,
        }
    }

    /// Name of the strategy that ended arbitration, if one did.
    pub fn strategy(&self) -> Option<&str> {
        match self {
            RetryError::Exhausted { strategy, .. }
            | RetryError::Callback { strategy, .. }
            | RetryError::Fallback { strategy, .. } => Some(strategy),
            RetryError::NotRetryable(_) | RetryError::Cancelled { .. } => None,
        }
    }

    pub fn is_not_retryable(&self) -> bool {
        matches!(self, RetryError::NotRetryable(_))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::NotRetryable(original) | RetryError::Exhausted { original, .. } => {
                write!(f, "{}", original)
            }
            RetryError::Callback {
                original,
                strategy,
                cause,
            } => write!(
                f,
                "on-retry action of strategy {} failed: {} (while handling: {})",
                strategy, cause, original
            ),
            RetryError::Fallback {
                original,
                strategy,
                cause,
            } => write!(
                f,
                "fallback of strategy {} failed: {} (while handling: {})",
                strategy, cause, original
            ),
            RetryError::Cancelled { attempts } => {
                write!(f, "retry cancelled after {} attempts", attempts)
            }
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            // Transparent: delegate so the chain matches the original error.
            RetryError::NotRetryable(original) | RetryError::Exhausted { original, .. } => {
                original.source()
            }
            RetryError::Callback { cause, .. } | RetryError::Fallback { cause, .. } => {
                Some(&**cause)
            }
            RetryError::Cancelled { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::testing::TestError;

    #[test]
    fn terminal_errors_display_like_the_original() {
        let e = RetryError::NotRetryable(TestError::http(404));
        assert_eq!(e.to_string(), "HTTP 404");
        let e = RetryError::Exhausted {
            original: TestError::of("timeout"),
            strategy: "exponential".into(),
            attempts: 4,
        };
        assert_eq!(e.to_string(), "timeout");
        assert!(e.is_exhausted());
        assert_eq!(e.strategy(), Some("exponential"));
        assert_eq!(e.into_original(), Some(TestError::of("timeout")));
    }

    #[test]
    fn callback_failure_wraps_both_errors() {
        let e = RetryError::Callback {
            original: TestError::http(503),
            strategy: "s".into(),
            cause: "metrics sink closed".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("metrics sink closed"));
        assert!(msg.contains("HTTP 503"));
        assert_eq!(
            e.source().map(|s| s.to_string()).as_deref(),
            Some("metrics sink closed")
        );
    }

    #[test]
    fn cancelled_has_no_original() {
        let e: RetryError<TestError> = RetryError::Cancelled { attempts: 2 };
        assert!(e.is_cancelled());
        assert!(e.original().is_none());
        assert_eq!(e.to_string(), "retry cancelled after 2 attempts");
    }
}
