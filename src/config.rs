//! CLI configuration (`config.toml` in the config directory).
//!
//! ```toml
//! jobs = 8
//! aws_profile = "deploy"
//! read_timeout_secs = 30
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 250
//! ```
//!
//! Every key is optional; command-line flags override file values.

use crate::paths;
use anyhow::{Context, Result, ensure};
use logkit::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackweaveConfig {
    /// Log groups reconciled in parallel
    #[serde(default)]
    pub jobs: Option<usize>,
    /// AWS credentials profile
    #[serde(default)]
    pub aws_profile: Option<String>,
    /// Per-request read timeout for logging-service calls
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Retry settings for logging-service calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
    #[serde(default)]
    pub backoff_factor: Option<f64>,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl StackweaveConfig {
    /// Load the config file, or defaults if it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_file()?)
    }

    /// Load a specific config file, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    /// Retry policy with file overrides applied to the defaults.
    pub fn retry_config(&self) -> Result<RetryConfig> {
        let defaults = RetryConfig::default();
        let backoff_factor = self.retry.backoff_factor.unwrap_or(defaults.backoff_factor);
        ensure!(
            backoff_factor >= 1.0,
            "retry.backoff_factor must be a number of at least 1.0, got {backoff_factor}"
        );

        Ok(RetryConfig {
            max_attempts: self.retry.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            base_delay: self
                .retry
                .base_delay_ms
                .map_or(defaults.base_delay, Duration::from_millis),
            backoff_factor,
            max_delay: self
                .retry
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
        })
    }
}
