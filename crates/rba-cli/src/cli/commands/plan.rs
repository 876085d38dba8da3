//! `rba plan` – print the wait schedule of each strategy.

use anyhow::Result;
use rba_core::config::RbaConfig;
use rba_core::retry::{BackoffStrategy, RetryDecision};
use std::time::Duration;

use super::run::CommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlanRow {
    attempt: u32,
    /// `None` once the budget is spent.
    wait: Option<Duration>,
    total: Duration,
}

/// Decisions for claims `1..=rows`, stopping at the first give-up.
fn schedule<E>(strategy: &BackoffStrategy<E>, rows: u32) -> Vec<PlanRow> {
    let mut total = Duration::ZERO;
    let mut out = Vec::new();
    for attempt in 1..=rows {
        match strategy.decide(attempt) {
            RetryDecision::RetryAfter(wait) => {
                total = total.saturating_add(wait);
                out.push(PlanRow {
                    attempt,
                    wait: Some(wait),
                    total,
                });
            }
            RetryDecision::NoRetry => {
                out.push(PlanRow {
                    attempt,
                    wait: None,
                    total,
                });
                break;
            }
        }
    }
    out
}

pub fn run_plan(cfg: &RbaConfig, attempts: Option<u32>) -> Result<()> {
    if cfg.strategies.is_empty() {
        println!("No strategies configured.");
        return Ok(());
    }
    for (i, sc) in cfg.strategies.iter().enumerate() {
        let strategy = sc.to_strategy::<CommandError>()?;
        if i > 0 {
            println!();
        }
        println!(
            "{} ({}, {} matching, max {} retries)",
            strategy.name(),
            strategy.backoff().name(),
            strategy.classifier().describe(),
            strategy.max_retries()
        );
        println!("{:<8} {:>12} {:>12}", "ATTEMPT", "WAIT", "TOTAL");
        let rows = attempts.unwrap_or_else(|| strategy.max_retries().saturating_add(1));
        for row in schedule(&strategy, rows) {
            let wait = row
                .wait
                .map(|w| format!("{:?}", w))
                .unwrap_or_else(|| "give up".to_string());
            println!(
                "{:<8} {:>12} {:>12}",
                row.attempt,
                wait,
                format!("{:?}", row.total)
            );
        }
    }
    Ok(())
}
