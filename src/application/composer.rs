//! # Message Composer
//!
//! Turns a classified failure into the sentence shown to the user.
//! Input errors are informative as-is and are echoed verbatim; everything else
//! gets a canned, non-technical sentence naming the command.

use crate::domain::types::{ErrorCategory, ErrorRecord};
use crate::strings::messages;

/// Canned sentence for `category`, mentioning `command`.
pub fn compose(category: ErrorCategory, command: &str) -> String {
    match category {
        ErrorCategory::Connection => messages::connection_failed(command),
        ErrorCategory::Authentication => messages::authentication_failed(command),
        ErrorCategory::RateLimit => messages::rate_limited(command),
        ErrorCategory::Media => messages::media_failed(command),
        ErrorCategory::Validation | ErrorCategory::Input => messages::input_rejected(command),
        ErrorCategory::Recipient => messages::recipient_failed(command),
        ErrorCategory::Unknown => messages::unknown_failure(command),
    }
}

/// Full report for a failed command.
///
/// `Input` and `Validation` show the original error text behind the error marker.
/// `detailed` appends the raw error chain and is meant for administrators only.
pub fn compose_report(error: &ErrorRecord, category: ErrorCategory, command: &str, detailed: bool) -> String {
    let mut text = if category.is_user_facing() && !error.message.trim().is_empty() {
        messages::verbatim_error(error.message.trim())
    } else {
        compose(category, command)
    };

    if detailed {
        let details = error.trace.as_deref().unwrap_or(&error.message);
        text.push_str(&messages::technical_details(category.as_str(), details));
    }
    text
}
