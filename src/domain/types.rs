//! # Domain Types
//!
//! Common data structures and enums used across the delivery and supervision logic.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Platform id of a delivered message (e.g., a Matrix event id).
pub type MessageId = String;

/// Recipient used when neither the message nor the connection names one.
/// Error reports addressed to it are skipped.
pub const UNKNOWN_RECIPIENT: &str = "unknown";

/// An inbound chat message that triggered a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Where the message was posted; the default send target.
    pub recipient: String,
    pub sender: String,
    /// Platform id of this message, used as the anchor for quoted replies.
    pub message_id: Option<MessageId>,
    pub body: String,
}

impl InboundMessage {
    pub fn new(recipient: impl Into<String>, sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            sender: sender.into(),
            message_id: None,
            body: body.into(),
        }
    }

    pub fn with_message_id(mut self, id: impl Into<MessageId>) -> Self {
        self.message_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
}

/// Payload handed to a `Connection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    Text(String),
    /// Bot notice (rendered less prominently by most clients).
    Notice(String),
    /// Text quoting an earlier message.
    Reply { body: String, in_reply_to: MessageId },
    Media {
        kind: MediaKind,
        url: String,
        caption: Option<String>,
    },
}

impl OutboundContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(body.into())
    }

    /// Same content without any quoting relation.
    pub fn unquoted(&self) -> Self {
        match self {
            Self::Reply { body, .. } => Self::Text(body.clone()),
            other => other.clone(),
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Reply { .. })
    }
}

/// The classified kind of an error.
///
/// Drives both retry eligibility in the dispatcher and the wording of the
/// message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Connection,
    Authentication,
    RateLimit,
    Media,
    Validation,
    Recipient,
    Input,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 8] = [
        ErrorCategory::Input,
        ErrorCategory::Connection,
        ErrorCategory::Authentication,
        ErrorCategory::RateLimit,
        ErrorCategory::Media,
        ErrorCategory::Validation,
        ErrorCategory::Recipient,
        ErrorCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Authentication => "authentication",
            Self::RateLimit => "rate_limit",
            Self::Media => "media",
            Self::Validation => "validation",
            Self::Recipient => "recipient",
            Self::Input => "input",
            Self::Unknown => "unknown",
        }
    }

    /// Errors the user caused and can fix themselves; shown verbatim.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::Input | Self::Validation)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error a command handler raises when the user supplied bad input.
///
/// Handlers return it through `anyhow` (`return Err(UserError::new("...").into())`);
/// it is always classified as `input` and shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UserError {
    pub message: String,
}

impl UserError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A handler failure, captured for classification and reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub message: String,
    pub is_user_error: bool,
    /// Full error chain, only ever shown in detailed (admin) reports.
    pub trace: Option<String>,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_user_error: false,
            trace: None,
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self {
            is_user_error: true,
            ..Self::new(message)
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

/// A `UserError` anywhere in the chain supplies the message verbatim; otherwise the
/// message is the whole chain (`context: cause`) so the root cause stays classifiable.
impl From<&anyhow::Error> for ErrorRecord {
    fn from(err: &anyhow::Error) -> Self {
        let user_error = err.chain().find_map(|cause| cause.downcast_ref::<UserError>());
        let record = match user_error {
            Some(user) => Self::user(user.message.clone()),
            None => Self::new(format!("{err:#}")),
        };
        record.with_trace(format!("{err:?}"))
    }
}

/// One supervised command call.
///
/// The handler itself and the connection are passed to the supervisor alongside.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub message: InboundMessage,
    pub args: Vec<String>,
    pub command: String,
    /// Name of the module the command belongs to, for logs.
    pub module: String,
    /// Append technical detail to error reports (administrator contexts).
    pub detailed: bool,
}

impl CommandInvocation {
    pub fn new(command: impl Into<String>, module: impl Into<String>, message: InboundMessage, args: Vec<String>) -> Self {
        Self {
            message,
            args,
            command: command.into(),
            module: module.into(),
            detailed: false,
        }
    }

    pub fn detailed(mut self, detailed: bool) -> Self {
        self.detailed = detailed;
        self
    }
}
