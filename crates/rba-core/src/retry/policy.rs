use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Caller-supplied wait function: 1-based attempt number to delay.
pub type WaitFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Decision for one claimed failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Budget exhausted; the original error is surfaced.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Wait-time policy of a strategy.
#[derive(Clone)]
pub enum Backoff {
    /// Retry right away.
    Immediate,
    /// `base^attempt` units, optionally capped.
    ///
    /// `base = 1` waits exactly one unit before every retry.
    Exponential {
        base: u32,
        unit: Duration,
        max_delay: Option<Duration>,
    },
    Custom(WaitFn),
}

impl Backoff {
    pub const DEFAULT_BASE: u32 = 2;
    pub const DEFAULT_UNIT: Duration = Duration::from_secs(1);

    pub fn exponential(base: u32) -> Self {
        Backoff::Exponential {
            base,
            unit: Self::DEFAULT_UNIT,
            max_delay: None,
        }
    }

    /// Delay before retry number `attempt` (1-based). Deterministic.
    pub fn wait(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Immediate => Duration::ZERO,
            Backoff::Exponential {
                base,
                unit,
                max_delay,
            } => {
                let raw = unit.saturating_mul(base.saturating_pow(attempt));
                match max_delay {
                    Some(cap) => raw.min(*cap),
                    None => raw,
                }
            }
            Backoff::Custom(f) => f(attempt),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backoff::Immediate => "immediate",
            Backoff::Exponential { .. } => "exponential",
            Backoff::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::Immediate => f.write_str("Immediate"),
            Backoff::Exponential {
                base,
                unit,
                max_delay,
            } => f
                .debug_struct("Exponential")
                .field("base", base)
                .field("unit", unit)
                .field("max_delay", max_delay)
                .finish(),
            Backoff::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
