//! # Messages
//!
//! Contains constant strings and format functions for user-facing messages.
//! Includes the per-category error reports and command replies.

pub const ERROR_MARKER: &str = "❌";
pub const UNKNOWN_COMMAND: &str = "❓ Unknown command. Try `.help`.";
pub const ADMIN_ONLY: &str = "Only administrators can reset statistics.";
pub const STATS_RESET: &str = "📊 Statistics reset.";
pub const PONG: &str = "🏓 Pong!";
pub const ECHO_USAGE: &str = "Please provide some text to echo.";

pub fn connection_failed(command: &str) -> String {
    format!("⚠️ I couldn't reach the server while running `{command}`. This is usually temporary, please try again in a moment.")
}

pub fn authentication_failed(command: &str) -> String {
    format!("🔒 I don't have permission to complete `{command}` here. An administrator may need to check my access.")
}

pub fn rate_limited(command: &str) -> String {
    format!("⏳ Too many requests while running `{command}`. Please slow down and try again shortly.")
}

pub fn media_failed(command: &str) -> String {
    format!("🖼️ I couldn't process the media for `{command}`. Check that the file isn't too large and uses a supported format.")
}

pub fn input_rejected(command: &str) -> String {
    format!("{ERROR_MARKER} The input for `{command}` wasn't valid. Please check it and try again.")
}

pub fn recipient_failed(command: &str) -> String {
    format!("📭 I couldn't deliver the result of `{command}` to this chat. Please try a different chat.")
}

pub fn unknown_failure(command: &str) -> String {
    format!("😕 Sorry, something went wrong while running `{command}`. Please try again later.")
}

/// Original error text for input-shaped errors.
pub fn verbatim_error(message: &str) -> String {
    format!("{ERROR_MARKER} {message}")
}

pub fn technical_details(category: &str, details: &str) -> String {
    format!("\n\n**Details** (`{category}`):\n```\n{details}\n```")
}

pub fn echo(text: &str) -> String {
    format!("🔁 {text}")
}

pub fn stats_summary(
    sent: u64,
    errors: u64,
    retries: u64,
    successful_retries: u64,
    success_rate: f64,
    retry_success_rate: f64,
) -> String {
    format!(
        "**📊 Delivery Statistics**\n* Attempts: {sent}\n* Errors: {errors}\n* Retries: {retries} ({successful_retries} successful)\n* Success rate: {success_rate:.1}%\n* Retry success rate: {retry_success_rate:.1}%"
    )
}
