//! Error types for the transformation engine.
//!
//! Static errors (validation, missing layer version, missing stack name)
//! abort the invocation before anything is returned. Reconciliation errors are
//! collected per log group and reported together once every unit has run.

use crate::runtime::RuntimeType;
use thiserror::Error;

/// A single log group that failed to reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileFailure {
    /// Function key(s) owning the log group
    pub key: String,
    /// Resolved log group name or prefix
    pub log_group: String,
    /// Error reported by the logging service
    pub error: String,
}

/// Errors that can occur while transforming a template.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unsupported template shape, or a bad option value
    #[error("invalid template: {0}")]
    Validation(String),

    /// A function's runtime family needs a layer version that was not given
    #[error(
        "no {param} option was provided for function '{function}' with {runtime} runtime",
        param = .runtime.layer_version_param().unwrap_or("layer version")
    )]
    MissingLayerVersion {
        /// Key of the offending function
        function: String,
        /// Runtime family of the function
        runtime: RuntimeType,
    },

    /// Log group names depend on the stack name, which was not given
    #[error(
        "a stackName option is required to resolve log group names for functions without a fixed FunctionName: {}",
        .functions.join(", ")
    )]
    MissingStackName {
        /// Every function whose log group name could not be derived
        functions: Vec<String>,
    },

    /// One or more log groups failed to reconcile
    #[error("failed to subscribe {} log group(s) to the forwarder: {}", .failures.len(), format_failures(.failures))]
    Reconciliation {
        /// Per log group failures, sorted by function key
        failures: Vec<ReconcileFailure>,
    },

    /// Forwarding requested without a logging-service client
    #[error("forwarderArn is set but no logging-service client is available")]
    NoClient,

    /// Worker pool could not be created
    #[error("failed to create reconciliation worker pool: {0}")]
    WorkerPool(String),
}

impl Error {
    /// Whether the mutated fragment is still meaningful after this error.
    ///
    /// Only reconciliation failures leave a complete fragment behind.
    pub fn keeps_fragment(&self) -> bool {
        matches!(self, Self::Reconciliation { .. })
    }
}

fn format_failures(failures: &[ReconcileFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({}): {}", f.key, f.log_group, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for transformation operations.
pub type Result<T> = std::result::Result<T, Error>;
