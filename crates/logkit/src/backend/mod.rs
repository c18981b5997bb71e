//! Backend abstraction for logging-service operations.
//!
//! The [`Backend`] trait covers the four CloudWatch Logs calls needed to
//! converge a log group onto a forwarding destination.
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use logkit::backend::{Backend, MockBackend, Operation};
//!
//! let mock = MockBackend::new();
//! mock.add_log_group("/aws/lambda/api");
//!
//! let groups = mock.describe_log_groups("/aws/lambda/").unwrap();
//! assert_eq!(groups.len(), 1);
//! assert_eq!(mock.count(Operation::DescribeLogGroups), 1);
//! ```

pub mod sdk;

use crate::error::{Error, Result};
use crate::types::{LogGroup, SubscriptionFilter};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Maximum number of subscription filters CloudWatch Logs allows per log group.
pub const MAX_SUBSCRIPTION_FILTERS: usize = 2;

/// Backend trait for logging-service operations.
///
/// All operations are fallible and safe to repeat: creating something that
/// already exists surfaces as [`Error::AlreadyExists`].
pub trait Backend: Send + Sync {
    /// List log groups whose name starts with `prefix`.
    fn describe_log_groups(&self, prefix: &str) -> Result<Vec<LogGroup>>;

    /// Create a log group.
    fn create_log_group(&self, name: &str) -> Result<()>;

    /// List subscription filters attached to a log group.
    fn describe_subscription_filters(&self, log_group: &str) -> Result<Vec<SubscriptionFilter>>;

    /// Create or update a subscription filter on a log group.
    fn put_subscription_filter(
        &self,
        log_group: &str,
        filter_name: &str,
        destination_arn: &str,
        filter_pattern: &str,
    ) -> Result<()>;
}

/// The remote operations, used for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DescribeLogGroups,
    CreateLogGroup,
    DescribeSubscriptionFilters,
    PutSubscriptionFilter,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::DescribeLogGroups => write!(f, "describe-log-groups"),
            Operation::CreateLogGroup => write!(f, "create-log-group"),
            Operation::DescribeSubscriptionFilters => write!(f, "describe-subscription-filters"),
            Operation::PutSubscriptionFilter => write!(f, "put-subscription-filter"),
        }
    }
}

/// A call recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DescribeLogGroups { prefix: String },
    CreateLogGroup { name: String },
    DescribeSubscriptionFilters { log_group: String },
    PutSubscriptionFilter {
        log_group: String,
        filter_name: String,
        destination_arn: String,
        filter_pattern: String,
    },
}

impl Call {
    /// The operation this call belongs to.
    pub fn operation(&self) -> Operation {
        match self {
            Call::DescribeLogGroups { .. } => Operation::DescribeLogGroups,
            Call::CreateLogGroup { .. } => Operation::CreateLogGroup,
            Call::DescribeSubscriptionFilters { .. } => Operation::DescribeSubscriptionFilters,
            Call::PutSubscriptionFilter { .. } => Operation::PutSubscriptionFilter,
        }
    }
}

/// Failure to inject into a [`MockBackend`] operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    Throttled,
    Network,
    AccessDenied,
    Other(String),
}

impl MockFailure {
    fn to_error(&self) -> Error {
        match self {
            MockFailure::Throttled => Error::Throttled {
                message: "Rate exceeded".to_string(),
            },
            MockFailure::Network => Error::Network {
                message: "dispatch failure: connection reset".to_string(),
            },
            MockFailure::AccessDenied => Error::AccessDenied {
                message: "not authorized to perform this operation".to_string(),
            },
            MockFailure::Other(message) => Error::Other(message.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    /// Log group name -> attached filters
    log_groups: BTreeMap<String, Vec<SubscriptionFilter>>,
    /// Log group name -> creation time; groups are created one tick apart
    created_at: HashMap<String, i64>,
    clock: i64,
    calls: Vec<Call>,
    /// (operation, target) -> (failure, remaining count; None = always)
    failures: HashMap<(Operation, String), (MockFailure, Option<u32>)>,
}

impl MockState {
    fn insert_log_group(&mut self, name: String) {
        if self.log_groups.contains_key(&name) {
            return;
        }
        self.clock += 1;
        self.created_at.insert(name.clone(), self.clock);
        self.log_groups.insert(name, Vec::new());
    }
}

/// In-memory backend for testing without network access.
///
/// Behaves like CloudWatch Logs for the four supported calls, records every
/// call, and can be told to fail specific operations on specific targets.
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an existing log group with no filters.
    ///
    /// Each new group is newer than every group seeded before it.
    pub fn add_log_group(&self, name: impl Into<String>) {
        self.lock().insert_log_group(name.into());
    }

    /// Seed an existing subscription filter (creating the log group if needed).
    pub fn add_subscription_filter(&self, filter: SubscriptionFilter) {
        let mut state = self.lock();
        state.insert_log_group(filter.log_group_name.clone());
        if let Some(filters) = state.log_groups.get_mut(&filter.log_group_name) {
            filters.push(filter);
        }
    }

    /// Make `operation` on `target` fail every time.
    ///
    /// `target` is the prefix for `DescribeLogGroups` and the log group name
    /// for every other operation.
    pub fn fail(&self, operation: Operation, target: impl Into<String>, failure: MockFailure) {
        self.lock()
            .failures
            .insert((operation, target.into()), (failure, None));
    }

    /// Make `operation` on `target` fail the next `times` calls only.
    pub fn fail_times(
        &self,
        operation: Operation,
        target: impl Into<String>,
        failure: MockFailure,
        times: u32,
    ) {
        self.lock()
            .failures
            .insert((operation, target.into()), (failure, Some(times)));
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of calls made to an operation.
    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Whether a log group currently exists.
    pub fn has_log_group(&self, name: &str) -> bool {
        self.lock().log_groups.contains_key(name)
    }

    /// Filters currently attached to a log group.
    pub fn filters(&self, log_group: &str) -> Vec<SubscriptionFilter> {
        self.lock()
            .log_groups
            .get(log_group)
            .cloned()
            .unwrap_or_default()
    }

    /// Record a call and return the injected failure for it, if any.
    fn record(state: &mut MockState, call: Call, target: &str) -> Result<()> {
        let operation = call.operation();
        state.calls.push(call);

        let key = (operation, target.to_string());
        let Some((failure, remaining)) = state.failures.get_mut(&key) else {
            return Ok(());
        };

        let error = failure.to_error();
        match remaining {
            None => Err(error),
            Some(0) => Ok(()),
            Some(n) => {
                *n -= 1;
                Err(error)
            }
        }
    }
}

impl Backend for MockBackend {
    fn describe_log_groups(&self, prefix: &str) -> Result<Vec<LogGroup>> {
        let mut state = self.lock();
        let call = Call::DescribeLogGroups {
            prefix: prefix.to_string(),
        };
        Self::record(&mut state, call, prefix)?;

        Ok(state
            .log_groups
            .keys()
            .filter(|name| name.starts_with(prefix))
            .map(|name| LogGroup {
                creation_time: state.created_at.get(name).copied(),
                ..LogGroup::named(name)
            })
            .collect())
    }

    fn create_log_group(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        let call = Call::CreateLogGroup {
            name: name.to_string(),
        };
        Self::record(&mut state, call, name)?;

        if state.log_groups.contains_key(name) {
            return Err(Error::AlreadyExists {
                name: name.to_string(),
            });
        }
        state.insert_log_group(name.to_string());
        Ok(())
    }

    fn describe_subscription_filters(&self, log_group: &str) -> Result<Vec<SubscriptionFilter>> {
        let mut state = self.lock();
        let call = Call::DescribeSubscriptionFilters {
            log_group: log_group.to_string(),
        };
        Self::record(&mut state, call, log_group)?;

        state
            .log_groups
            .get(log_group)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                name: log_group.to_string(),
            })
    }

    fn put_subscription_filter(
        &self,
        log_group: &str,
        filter_name: &str,
        destination_arn: &str,
        filter_pattern: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        let call = Call::PutSubscriptionFilter {
            log_group: log_group.to_string(),
            filter_name: filter_name.to_string(),
            destination_arn: destination_arn.to_string(),
            filter_pattern: filter_pattern.to_string(),
        };
        Self::record(&mut state, call, log_group)?;

        let filters = state
            .log_groups
            .get_mut(log_group)
            .ok_or_else(|| Error::NotFound {
                name: log_group.to_string(),
            })?;

        let filter =
            SubscriptionFilter::new(filter_name, log_group, destination_arn, filter_pattern);
        if let Some(existing) = filters.iter_mut().find(|f| f.filter_name == filter_name) {
            *existing = filter;
            return Ok(());
        }

        if filters.len() >= MAX_SUBSCRIPTION_FILTERS {
            return Err(Error::LimitExceeded {
                message: format!(
                    "{log_group} already has {MAX_SUBSCRIPTION_FILTERS} subscription filters"
                ),
            });
        }
        filters.push(filter);
        Ok(())
    }
}
