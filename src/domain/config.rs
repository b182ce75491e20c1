//! # Configuration
//!
//! Manages the loading and parsing of the application's configuration file (`config.yaml`).
//! Defines the structs for the Matrix connection, delivery retries, and command supervision.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::domain::types::ErrorCategory;

/// Main application configuration structure.
/// Matches the layout of `data/config.yaml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub services: ServicesConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Configuration for various connected services.
#[derive(Debug, Deserialize, Clone)]
pub struct ServicesConfig {
    pub matrix: MatrixConfig,
}

/// Specific configuration for the Matrix service.
#[derive(Debug, Deserialize, Clone)]
pub struct MatrixConfig {
    pub username: String,
    pub password: String,
    pub homeserver: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffMode {
    #[default]
    Fixed,
    Exponential,
}

/// Retry settings for ordinary outbound messages.
#[derive(Debug, Deserialize, Clone)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub backoff: BackoffMode,
    #[serde(default = "default_true")]
    pub fallback_to_direct_message: bool,
    #[serde(default = "default_non_retriable")]
    pub non_retriable: Vec<ErrorCategory>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff: BackoffMode::default(),
            fallback_to_direct_message: true,
            non_retriable: default_non_retriable(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutAction {
    /// Abort the handler task at its next await point.
    #[default]
    Abort,
    /// Leave the handler running and drop its result.
    Detach,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SupervisorConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_long_timeout_ms")]
    pub long_timeout_ms: u64,
    /// Commands that get `long_timeout_ms` instead of `timeout_ms`.
    #[serde(default)]
    pub long_commands: Vec<String>,
    #[serde(default)]
    pub on_timeout: TimeoutAction,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            long_timeout_ms: default_long_timeout_ms(),
            long_commands: Vec::new(),
            on_timeout: TimeoutAction::default(),
            report: ReportConfig::default(),
        }
    }
}

/// Retry settings for error reports. Always exponential.
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub initial_delay_ms: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// System-level settings for the bot.
#[derive(Debug, Deserialize, Clone)]
pub struct SystemConfig {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Users who receive detailed error reports and may reset statistics.
    #[serde(default)]
    pub admin: Vec<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            admin: Vec::new(),
        }
    }
}

impl SystemConfig {
    pub fn is_admin(&self, user: &str) -> bool {
        self.admin.iter().any(|a| a == user)
    }
}

fn default_max_retries() -> u32 {
    2
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_long_timeout_ms() -> u64 {
    60_000
}
fn default_true() -> bool {
    true
}
fn default_command_prefix() -> String {
    ".".to_string()
}
fn default_non_retriable() -> Vec<ErrorCategory> {
    vec![
        ErrorCategory::Authentication,
        ErrorCategory::Validation,
        ErrorCategory::Recipient,
    ]
}
