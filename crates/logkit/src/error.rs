//! Error types for logging-service operations.
//!
//! Errors are categorized so the caller can decide whether an operation is
//! worth retrying, can be ignored because the remote side already converged,
//! or must be reported.

use thiserror::Error;

/// Categories of logging-service errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Request throttled by the service (transient, retryable)
    Throttled,
    /// Connectivity or timeout problem (transient, retryable)
    Network,
    /// The resource already exists
    AlreadyExists,
    /// The log group does not exist
    NotFound,
    /// A service quota was hit (e.g. subscription filters per log group)
    LimitExceeded,
    /// Credentials are missing or lack permission
    AccessDenied,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled | Self::Network)
    }

    /// Whether this error can be safely ignored (operation already done).
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::AlreadyExists)
    }
}

/// Errors that can occur while talking to the logging service.
#[derive(Debug, Error)]
pub enum Error {
    /// The service throttled the request
    #[error("throttled: {message}")]
    Throttled {
        /// Message returned by the service
        message: String,
    },

    /// Network-related error (connection, timeout, DNS, etc.)
    #[error("network error: {message}")]
    Network {
        /// Detailed error message from the failed network operation
        message: String,
    },

    /// The resource being created already exists
    #[error("already exists: {name}")]
    AlreadyExists {
        /// Name of the existing resource
        name: String,
    },

    /// The log group does not exist
    #[error("log group not found: {name}")]
    NotFound {
        /// Name of the missing log group
        name: String,
    },

    /// A service quota was hit
    #[error("limit exceeded: {message}")]
    LimitExceeded {
        /// Description of the limit
        message: String,
    },

    /// Missing credentials or insufficient permissions
    #[error("access denied: {message}")]
    AccessDenied {
        /// Message returned by the service
        message: String,
    },

    /// Any other service or SDK failure
    #[error("{operation} failed: {message}")]
    Service {
        /// Remote operation that failed
        operation: &'static str,
        /// Error code returned by the service, when there is one
        code: Option<String>,
        /// Full error chain
        message: String,
    },

    /// The async runtime driving the SDK could not start
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Throttled { .. } => ErrorCategory::Throttled,
            Error::Network { .. } => ErrorCategory::Network,
            Error::AlreadyExists { .. } => ErrorCategory::AlreadyExists,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::LimitExceeded { .. } => ErrorCategory::LimitExceeded,
            Error::AccessDenied { .. } => ErrorCategory::AccessDenied,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether this error can be safely ignored.
    pub fn is_ignorable(&self) -> bool {
        self.category().is_ignorable()
    }
}

/// Result type for logging-service operations.
pub type Result<T> = std::result::Result<T, Error>;
