//! # Domain Traits
//!
//! Abstract interface for the chat connection the bot sends through.
//! Allows for pluggable implementations in the Infrastructure layer (Matrix, test doubles).

use async_trait::async_trait;

use crate::domain::types::{MessageId, OutboundContent};

/// Abstract interface for a chat connection (e.g., Matrix).
///
/// A send may fail transiently, be rate-limited, or be rejected because the
/// recipient is malformed. Implementations must be safe to call repeatedly
/// with the same arguments.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send `content` to `recipient`, returning the platform id of the new message.
    async fn send(&self, recipient: &str, content: &OutboundContent) -> Result<MessageId, String>;

    /// The connection's own identity, if it is logged in.
    fn identity(&self) -> Option<String>;
}
