//! # Delivery Statistics
//!
//! Counters updated by every dispatcher call. One tracker is created at startup and
//! shared by reference; tests build their own isolated instances.

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide delivery counters.
///
/// `sent` counts attempts, not messages: a message delivered on its second try
/// contributes two sends, one error, one retry and one successful retry.
#[derive(Debug, Default)]
pub struct StatsTracker {
    sent: AtomicU64,
    errors: AtomicU64,
    retries: AtomicU64,
    successful_retries: AtomicU64,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_send(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_successful_retry(&self) {
        self.successful_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let sent = self.sent.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let retries = self.retries.load(Ordering::Relaxed);
        let successful_retries = self.successful_retries.load(Ordering::Relaxed);

        let success_rate = if sent == 0 {
            100.0
        } else {
            // Counters are read one at a time; clamp so a racing snapshot never goes negative.
            sent.saturating_sub(errors) as f64 / sent as f64 * 100.0
        };
        let retry_success_rate = if retries == 0 {
            0.0
        } else {
            successful_retries.min(retries) as f64 / retries as f64 * 100.0
        };

        StatsSnapshot {
            sent,
            errors,
            retries,
            successful_retries,
            success_rate,
            retry_success_rate,
        }
    }

    pub fn reset(&self) {
        self.sent.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.successful_retries.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of the counters. Rates are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub sent: u64,
    pub errors: u64,
    pub retries: u64,
    pub successful_retries: u64,
    pub success_rate: f64,
    pub retry_success_rate: f64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent={} errors={} retries={} successful_retries={} success_rate={:.1}% retry_success_rate={:.1}%",
            self.sent,
            self.errors,
            self.retries,
            self.successful_retries,
            self.success_rate,
            self.retry_success_rate
        )
    }
}
