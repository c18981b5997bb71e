//! # transform
//!
//! CloudFormation macro engine that instruments Lambda functions for
//! observability and subscribes their log groups to a log forwarder.
//!
//! This crate provides:
//! - Runtime classification and instrumentation layer injection
//! - X-Ray tracing, service/env tags and environment variables
//! - Log group name resolution and parallel subscription reconciliation
//!   through [`logkit`]
//! - The [`Transformer`] tying these together into one macro invocation
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use transform::{MacroRequest, TransformOptions, Transformer};
//!
//! let request: MacroRequest = serde_json::from_value(json!({
//!     "region": "us-east-1",
//!     "accountId": "123456789012",
//!     "requestId": "1",
//!     "params": { "nodeLayerVersion": 112, "service": "api" },
//!     "fragment": { "Resources": { "Api": {
//!         "Type": "AWS::Lambda::Function",
//!         "Properties": { "Runtime": "nodejs20.x", "Handler": "index.handler" }
//!     }}}
//! })).unwrap();
//!
//! let response = Transformer::new(TransformOptions::default()).handle(request);
//! assert!(response.is_success());
//! ```

pub mod environment;
pub mod error;
pub mod forwarder;
pub mod intrinsics;
pub mod layers;
pub mod orchestrator;
pub mod params;
pub mod runtime;
pub mod tags;
pub mod template;
pub mod tracing;

pub use error::{Error, ReconcileFailure, Result};
pub use orchestrator::{
    MacroRequest, MacroResponse, Outcome, Status, TransformOptions, Transformer,
};
pub use params::TransformParams;
pub use runtime::{Runtime, RuntimeType};
pub use template::{FunctionResource, Template};
