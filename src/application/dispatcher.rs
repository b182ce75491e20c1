//! # Delivery Dispatcher
//!
//! Best-effort outbound delivery with bounded retries:
//! - Attempts run strictly in sequence; attempt 0 is sent immediately
//! - Waits between attempts follow the call's `RetryPolicy` (fixed or exponential)
//! - Authentication, validation and recipient failures are abandoned on the first try
//! - Quoted replies fall back to a plain message when allowed
//! - Every attempt is recorded in the shared `StatsTracker`
//!
//! Failures never escape as errors; callers get a `DeliveryOutcome` and must not
//! assume anything was received when it is `Failed`.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use crate::application::classifier::categorize_message;
use crate::application::policy::{RetryPolicy, SendOptions};
use crate::application::stats::StatsTracker;
use crate::domain::traits::Connection;
use crate::domain::types::{ErrorCategory, InboundMessage, MessageId, OutboundContent};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("recipient identifier is empty")]
    EmptyRecipient,

    #[error("{category} error is not retriable (attempt {attempts}): {message}")]
    NonRetriable {
        category: ErrorCategory,
        attempts: u32,
        message: String,
    },

    #[error("delivery failed after {attempts} attempts: {message}")]
    Exhausted {
        category: ErrorCategory,
        attempts: u32,
        message: String,
    },
}

impl DeliveryError {
    /// Connection sends made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryError::EmptyRecipient => 0,
            DeliveryError::NonRetriable { attempts, .. } | DeliveryError::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Terminal state of one delivery operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(MessageId),
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered(_))
    }

    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            DeliveryOutcome::Delivered(id) => Some(id),
            DeliveryOutcome::Failed(_) => None,
        }
    }
}

/// One send within a delivery operation.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryAttempt<'a> {
    pub recipient: &'a str,
    pub content: &'a OutboundContent,
    /// 0-based.
    pub index: u32,
    /// Wait before this attempt was made.
    pub delay: Duration,
}

/// Sends through a `Connection` with retries. Cheap to clone; clones share statistics.
#[derive(Clone)]
pub struct Dispatcher {
    stats: Arc<StatsTracker>,
    defaults: SendOptions,
}

impl Dispatcher {
    pub fn new(stats: Arc<StatsTracker>, defaults: SendOptions) -> Self {
        Self { stats, defaults }
    }

    pub fn stats(&self) -> &Arc<StatsTracker> {
        &self.stats
    }

    /// Options built from the `delivery` config section.
    pub fn defaults(&self) -> &SendOptions {
        &self.defaults
    }

    pub async fn send_text(
        &self,
        connection: &dyn Connection,
        recipient: &str,
        text: &str,
        options: &SendOptions,
    ) -> DeliveryOutcome {
        self.send_message(connection, recipient, &OutboundContent::text(text), options)
            .await
    }

    pub async fn send_message(
        &self,
        connection: &dyn Connection,
        recipient: &str,
        content: &OutboundContent,
        options: &SendOptions,
    ) -> DeliveryOutcome {
        self.deliver(connection, recipient, content, &options.policy).await
    }

    /// Reply quoting `original`.
    ///
    /// If the quoted send fails and `fallback_to_direct_message` is set, the same text is
    /// sent again without the quote (with a fresh retry budget). Messages without an id
    /// cannot be quoted and go out as plain text directly.
    pub async fn send_reply(
        &self,
        connection: &dyn Connection,
        original: &InboundMessage,
        text: &str,
        options: &SendOptions,
    ) -> DeliveryOutcome {
        let Some(anchor) = &original.message_id else {
            return self
                .send_text(connection, &original.recipient, text, options)
                .await;
        };

        let quoted = OutboundContent::Reply {
            body: text.to_string(),
            in_reply_to: anchor.clone(),
        };
        let outcome = self
            .deliver(connection, &original.recipient, &quoted, &options.policy)
            .await;

        match outcome {
            DeliveryOutcome::Failed(e) if options.fallback_to_direct_message && e != DeliveryError::EmptyRecipient => {
                tracing::warn!(
                    "Quoted reply to {} failed ({}), falling back to a direct message",
                    original.recipient,
                    e
                );
                self.deliver(connection, &original.recipient, &quoted.unquoted(), &options.policy)
                    .await
            }
            other => other,
        }
    }

    async fn deliver(
        &self,
        connection: &dyn Connection,
        recipient: &str,
        content: &OutboundContent,
        policy: &RetryPolicy,
    ) -> DeliveryOutcome {
        if recipient.trim().is_empty() {
            tracing::error!("Refusing to send: recipient identifier is empty");
            return DeliveryOutcome::Failed(DeliveryError::EmptyRecipient);
        }

        let max_attempts = policy.max_attempts();
        let mut index = 0;

        loop {
            let attempt = DeliveryAttempt {
                recipient,
                content,
                index,
                delay: policy.delay_for(index),
            };

            match self.attempt(connection, &attempt).await {
                Ok(id) => return DeliveryOutcome::Delivered(id),
                Err(message) => {
                    let category = categorize_message(&message);
                    let attempts = attempt.index + 1;

                    if !policy.is_retriable(category) {
                        tracing::error!(
                            "Send to {} abandoned after attempt {}: {} error is not retriable: {}",
                            recipient,
                            attempts,
                            category,
                            message
                        );
                        return DeliveryOutcome::Failed(DeliveryError::NonRetriable {
                            category,
                            attempts,
                            message,
                        });
                    }

                    if attempts >= max_attempts {
                        tracing::error!(
                            "Send to {} failed after {} attempts ({}): {}",
                            recipient,
                            attempts,
                            category,
                            message
                        );
                        return DeliveryOutcome::Failed(DeliveryError::Exhausted {
                            category,
                            attempts,
                            message,
                        });
                    }

                    tracing::warn!(
                        "Send to {} failed (attempt {}/{}, {}): {}. Retrying in {:?}",
                        recipient,
                        attempts,
                        max_attempts,
                        category,
                        message,
                        policy.delay_for(attempts)
                    );
                    index = attempts;
                }
            }
        }
    }

    async fn attempt(&self, connection: &dyn Connection, attempt: &DeliveryAttempt<'_>) -> Result<MessageId, String> {
        if attempt.index > 0 {
            self.stats.record_retry();
            sleep(attempt.delay).await;
        }

        self.stats.record_send();
        match connection.send(attempt.recipient, attempt.content).await {
            Ok(id) => {
                if attempt.index > 0 {
                    self.stats.record_successful_retry();
                    tracing::info!(
                        "Send to {} succeeded on attempt {}",
                        attempt.recipient,
                        attempt.index + 1
                    );
                }
                Ok(id)
            }
            Err(e) => {
                self.stats.record_error();
                Err(e)
            }
        }
    }
}
