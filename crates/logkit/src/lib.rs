//! # logkit
//!
//! A narrow CloudWatch Logs client for converging log groups onto a
//! forwarding destination.
//!
//! This crate provides:
//! - The [`Backend`](backend::Backend) trait with the four calls reconciliation needs
//! - An AWS SDK backend and an in-memory mock backend
//! - Error categorization (retryable, ignorable) and retry with backoff
//!
//! ## Example
//!
//! ```
//! use logkit::{Client, RetryConfig};
//! use logkit::backend::MockBackend;
//!
//! let client = Client::with_backend(Box::new(MockBackend::new()))
//!     .with_retry(RetryConfig::no_retry());
//!
//! client.ensure_log_group("/aws/lambda/api").unwrap();
//! assert_eq!(client.describe_log_groups("/aws/lambda/").unwrap().len(), 1);
//! ```

pub mod backend;
pub mod error;
pub mod retry;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use backend::sdk::SdkSettings;
pub use types::{LogGroup, RetryConfig, SubscriptionFilter};

use backend::sdk::SdkBackend;
use backend::{Backend, Operation};

/// High-level client for logging-service operations.
///
/// Wraps a backend and applies retry to every call. Creating a log group
/// that already exists is reported as success.
pub struct Client {
    backend: Box<dyn Backend>,
    retry: RetryConfig,
}

impl Client {
    /// Create a client backed by the AWS SDK.
    pub fn connect(settings: &SdkSettings) -> Result<Self> {
        Ok(Self::with_backend(Box::new(SdkBackend::connect(settings)?)))
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn retrying<T>(&self, operation: Operation, f: impl FnMut() -> Result<T>) -> Result<T> {
        retry::with_retry(
            &self.retry,
            &operation.to_string(),
            Some(&retry::LogCallback),
            f,
        )
    }

    /// List log groups whose name starts with `prefix`.
    pub fn describe_log_groups(&self, prefix: &str) -> Result<Vec<LogGroup>> {
        self.retrying(Operation::DescribeLogGroups, || {
            self.backend.describe_log_groups(prefix)
        })
    }

    /// Create a log group; an existing log group counts as success.
    ///
    /// Returns `true` if the group was created by this call.
    pub fn ensure_log_group(&self, name: &str) -> Result<bool> {
        match self.retrying(Operation::CreateLogGroup, || {
            self.backend.create_log_group(name)
        }) {
            Ok(()) => Ok(true),
            Err(e) if e.is_ignorable() => {
                log::debug!("log group {name} already exists");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// List subscription filters attached to a log group.
    pub fn describe_subscription_filters(
        &self,
        log_group: &str,
    ) -> Result<Vec<SubscriptionFilter>> {
        self.retrying(Operation::DescribeSubscriptionFilters, || {
            self.backend.describe_subscription_filters(log_group)
        })
    }

    /// Create or update a subscription filter.
    pub fn put_subscription_filter(
        &self,
        log_group: &str,
        filter_name: &str,
        destination_arn: &str,
        filter_pattern: &str,
    ) -> Result<()> {
        self.retrying(Operation::PutSubscriptionFilter, || {
            self.backend
                .put_subscription_filter(log_group, filter_name, destination_arn, filter_pattern)
        })
    }
}
