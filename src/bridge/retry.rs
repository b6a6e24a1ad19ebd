//! Per-item retry policy for migrations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Retry immediately.
    None,
    /// Fixed delay between retries.
    Fixed { delay_ms: u64 },
    /// Exponential backoff
    Exponential {
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl RetryStrategy {
    /// Delay before retry number `attempt` (1-based: the delay after the first
    /// failure is `delay_for_attempt(1)`).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::None => Duration::ZERO,
            RetryStrategy::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            RetryStrategy::Exponential {
                initial_delay_ms,
                max_delay_ms,
                multiplier,
            } => {
                let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let delay = (*initial_delay_ms as f64) * multiplier.powi(exp);
                let delay = delay.min(*max_delay_ms as f64).max(0.0);
                Duration::from_millis(delay as u64)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per item, including the first. At least 1.
    pub max_attempts: u32,
    #[serde(default)]
    pub strategy: RetryStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            strategy: RetryStrategy::default(),
        }
    }
}

impl RetryPolicy {
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            strategy: RetryStrategy::None,
        }
    }
}
