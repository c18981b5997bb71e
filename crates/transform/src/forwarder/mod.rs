//! Log forwarding: subscribe every function's log group to a forwarder.
//!
//! Resolution is static and happens first, so a missing stack name fails the
//! invocation before anything is sent to the logging service. Each log group
//! is then reconciled independently:
//!
//! 1. describe the log group; for a generated name, pick the newest match
//! 2. create it if an exact name does not exist yet
//! 3. describe its subscription filters
//! 4. put a filter unless one already delivers to the forwarder

pub mod executor;
pub mod naming;
pub mod subscription;
pub mod types;

pub use executor::reconcile;
pub use naming::{LogGroupDefinition, LogGroupName, resolve_log_groups};
pub use subscription::{LogSubscription, ReconcileContext};
pub use types::{ApplyResult, ReconcileReport, ReconcileSummary, UnitReport};
