//! Attempt budget and linear backoff delays.

use std::time::Duration;

use crate::config::RetryConfig;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempts exhausted; the job fails.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Bounded attempts with linear backoff: `base + (attempt - 1) * increment`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Extra delay per further failed attempt.
    pub increment: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Out-of-range delays (infinite or beyond `Duration`) fall back to the defaults.
    pub fn from_config(cfg: &RetryConfig) -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: delay_secs(cfg.base_delay_secs, defaults.base_delay_secs),
            increment: delay_secs(cfg.increment_secs, defaults.increment_secs),
        }
    }

    /// Decide what to do after `attempt` (1-based) failed.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        let steps = attempt.saturating_sub(1);
        RetryDecision::RetryAfter(
            self.base_delay
                .saturating_add(self.increment.saturating_mul(steps)),
        )
    }
}

fn delay_secs(secs: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or_else(|_| {
        tracing::warn!(secs, fallback, "retry delay out of range, using default");
        Duration::from_secs_f64(fallback)
    })
}
