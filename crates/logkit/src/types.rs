//! Core types for logging-service operations.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A CloudWatch Logs log group as returned by `DescribeLogGroups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogGroup {
    /// Full log group name, e.g. `/aws/lambda/my-function`
    pub log_group_name: String,
    /// Log group ARN
    #[serde(default)]
    pub arn: Option<String>,
    /// Creation time in milliseconds since the epoch
    #[serde(default)]
    pub creation_time: Option<i64>,
    /// Retention setting, if any
    #[serde(default)]
    pub retention_in_days: Option<u32>,
}

impl LogGroup {
    /// Create a log group with only a name (other fields unknown).
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            log_group_name: name.into(),
            arn: None,
            creation_time: None,
            retention_in_days: None,
        }
    }
}

/// A subscription filter attached to a log group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilter {
    /// Filter name (unique per log group)
    pub filter_name: String,
    /// Log group the filter is attached to
    pub log_group_name: String,
    /// Filter pattern; empty matches every event
    #[serde(default)]
    pub filter_pattern: String,
    /// Where matching events are delivered
    pub destination_arn: String,
}

impl SubscriptionFilter {
    /// Create a subscription filter.
    pub fn new(
        filter_name: impl Into<String>,
        log_group_name: impl Into<String>,
        destination_arn: impl Into<String>,
        filter_pattern: impl Into<String>,
    ) -> Self {
        Self {
            filter_name: filter_name.into(),
            log_group_name: log_group_name.into(),
            filter_pattern: filter_pattern.into(),
            destination_arn: destination_arn.into(),
        }
    }

    /// Whether this filter delivers to the given destination.
    pub fn targets(&self, destination_arn: &str) -> bool {
        self.destination_arn == destination_arn
    }
}

/// Configuration for retry logic.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Never exceeds `max_delay`; a delay that cannot be represented (negative
    /// or NaN factor) falls back to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_delay() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_config_max_delay() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(3),
        };

        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(6), Duration::from_secs(3));
    }

    #[test]
    fn test_retry_config_unrepresentable_delay() {
        let config = RetryConfig {
            backoff_factor: -2.0,
            ..RetryConfig::default()
        };
        assert_eq!(config.delay_for_attempt(1), config.max_delay);

        let config = RetryConfig {
            backoff_factor: f64::NAN,
            ..RetryConfig::default()
        };
        assert_eq!(config.delay_for_attempt(2), config.max_delay);
    }
}
