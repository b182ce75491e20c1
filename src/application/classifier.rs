//! # Error Classifier
//!
//! Maps an error to exactly one `ErrorCategory` by matching keywords in its message.
//! Categories overlap at the keyword level ("invalid recipient format" reads as both
//! validation and recipient), so rules are checked in a fixed order and the first hit wins.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::types::{ErrorCategory, ErrorRecord};

/// Rules in priority order. `Unknown` has no rule; it is the fallback.
const RULES: &[(ErrorCategory, &str)] = &[
    (
        ErrorCategory::Input,
        r"(?i)invalid argument|missing (?:parameter|argument)|please provide|not found|must be an? \w|usage:",
    ),
    (
        ErrorCategory::Connection,
        r"(?i)time(?:d)? ?out|network|\bconnect|disconnect|offline|unreachable|econn(?:refused|reset)|etimedout|socket|\bdns\b",
    ),
    (
        ErrorCategory::Authentication,
        r"(?i)\bauth|\blog ?in\b|credential|permission|forbidden|unauthori[sz]ed|\b40[13]\b|access denied|session expired|token",
    ),
    (
        ErrorCategory::RateLimit,
        r"(?i)rate.?limit|too many requests|throttl|\b429\b|\b5\d\d\b|quota|overloaded|service unavailable|internal server error|bad gateway",
    ),
    (
        ErrorCategory::Media,
        r"(?i)\bfile|image|video|audio|media|upload|attachment|sticker|mime|thumbnail",
    ),
    (
        ErrorCategory::Validation,
        r"(?i)invalid|format|validation|malformed|\bparse|bad request|\b400\b|too long",
    ),
    (
        ErrorCategory::Recipient,
        r"(?i)recipient|\bjid\b|room id|chat id|unknown room|addressee|not joined|not in (?:the )?room|user id",
    ),
];

fn compiled_rules() -> &'static [(ErrorCategory, Regex)] {
    static COMPILED: OnceLock<Vec<(ErrorCategory, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|(category, pattern)| match Regex::new(pattern) {
                Ok(regex) => Some((*category, regex)),
                Err(e) => {
                    tracing::error!("Invalid classifier pattern for {}: {}", category, e);
                    None
                }
            })
            .collect()
    })
}

/// Classify a handler or delivery error.
///
/// An explicit user-error flag always yields `Input`, whatever the message says.
pub fn categorize(error: &ErrorRecord) -> ErrorCategory {
    if error.is_user_error {
        return ErrorCategory::Input;
    }
    categorize_message(&error.message)
}

/// Classify raw error text (e.g., the `Err` string returned by a `Connection`).
pub fn categorize_message(message: &str) -> ErrorCategory {
    compiled_rules()
        .iter()
        .find(|(_, regex)| regex.is_match(message))
        .map(|(category, _)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}
