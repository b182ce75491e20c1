//! # Retry Policy
//!
//! One parameterised strategy for bounded retries: how many retries, how long to wait
//! between attempts (fixed or exponential), and which error categories are never retried.

use std::collections::HashSet;
use std::time::Duration;

use crate::domain::config::{BackoffMode, DeliveryConfig, ReportConfig};
use crate::domain::types::ErrorCategory;

/// Largest exponent applied by exponential backoff.
const MAX_EXPONENT: u32 = 16;

/// Strategy for calculating the wait before a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Every retry waits the same delay.
    Fixed(Duration),
    /// Retry `n` (1-based) waits `initial * 2^(n-1)`.
    Exponential { initial: Duration },
}

impl Backoff {
    /// Delay before the attempt with 0-based index `attempt`. The first attempt never waits.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { initial } => {
                let exponent = (attempt - 1).min(MAX_EXPONENT);
                initial.saturating_mul(2_u32.pow(exponent))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Categories abandoned after the first failure instead of burning the budget.
    pub non_retriable: HashSet<ErrorCategory>,
}

impl RetryPolicy {
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
            non_retriable: default_non_retriable(),
        }
    }

    pub fn exponential(max_retries: u32, initial: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential { initial },
            non_retriable: default_non_retriable(),
        }
    }

    pub fn with_non_retriable(mut self, categories: impl IntoIterator<Item = ErrorCategory>) -> Self {
        self.non_retriable = categories.into_iter().collect();
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn is_retriable(&self, category: ErrorCategory) -> bool {
        !self.non_retriable.contains(&category)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.delay_for(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&DeliveryConfig::default())
    }
}

impl From<&DeliveryConfig> for RetryPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        let delay = Duration::from_millis(config.retry_delay_ms);
        let policy = match config.backoff {
            BackoffMode::Fixed => RetryPolicy::fixed(config.max_retries, delay),
            BackoffMode::Exponential => RetryPolicy::exponential(config.max_retries, delay),
        };
        policy.with_non_retriable(config.non_retriable.iter().copied())
    }
}

impl From<&ReportConfig> for RetryPolicy {
    fn from(config: &ReportConfig) -> Self {
        RetryPolicy::exponential(config.max_retries, Duration::from_millis(config.initial_delay_ms))
    }
}

fn default_non_retriable() -> HashSet<ErrorCategory> {
    [
        ErrorCategory::Authentication,
        ErrorCategory::Validation,
        ErrorCategory::Recipient,
    ]
    .into_iter()
    .collect()
}

/// Per-call overrides for the dispatcher.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub policy: RetryPolicy,
    /// For replies: retry as a plain message when the quoted send fails.
    pub fallback_to_direct_message: bool,
}

impl SendOptions {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            fallback_to_direct_message: true,
        }
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback_to_direct_message = false;
        self
    }
}

impl Default for SendOptions {
    fn default() -> Self {
        SendOptions::from(&DeliveryConfig::default())
    }
}

impl From<&DeliveryConfig> for SendOptions {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            policy: RetryPolicy::from(config),
            fallback_to_direct_message: config.fallback_to_direct_message,
        }
    }
}
