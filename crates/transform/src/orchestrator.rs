//! Transformation orchestrator.
//!
//! Drives one macro invocation: parse and validate the fragment, resolve the
//! options, apply the static mutations, then reconcile log subscriptions when
//! a forwarder is configured. Every invocation produces exactly one
//! [`MacroResponse`].

use crate::environment::add_environment;
use crate::error::{Error, Result};
use crate::forwarder::{self, LogSubscription, ReconcileContext, ReconcileReport};
use crate::intrinsics::Scope;
use crate::layers::{LayerTarget, add_layers};
use crate::params::TransformParams;
use crate::tags::add_service_and_env_tags;
use crate::template::Template;
use crate::tracing::enable_tracing;
use logkit::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Macro invocation envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroRequest {
    pub region: String,
    pub account_id: String,
    pub fragment: Value,
    #[serde(default)]
    pub transform_id: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub request_id: String,
    #[serde(default)]
    pub template_parameter_values: Map<String, Value>,
}

/// Invocation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failure,
}

/// Macro response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroResponse {
    pub request_id: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl MacroResponse {
    pub fn success(request_id: impl Into<String>, fragment: Value) -> Self {
        Self {
            request_id: request_id.into(),
            status: Status::Success,
            fragment: Some(fragment),
            error_message: None,
        }
    }

    pub fn failure(
        request_id: impl Into<String>,
        error: &Error,
        fragment: Option<Value>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            status: Status::Failure,
            fragment,
            error_message: Some(error.to_string()),
        }
    }

    /// Package the result of [`Transformer::run`].
    ///
    /// Reconciliation failures yield a failure that still carries the
    /// mutated fragment.
    pub fn from_result(request_id: impl Into<String>, result: Result<Outcome>) -> Self {
        match result {
            Ok(outcome) => match outcome.reconciliation_error() {
                None => Self::success(request_id, outcome.fragment),
                Some(error) => {
                    log::error!("{error}");
                    Self::failure(request_id, &error, Some(outcome.fragment))
                }
            },
            Err(error) => {
                log::error!("{error}");
                Self::failure(request_id, &error, None)
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Engine options that do not come from the template.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Log groups reconciled concurrently
    pub jobs: usize,
    /// Describe only; create and subscribe nothing
    pub dry_run: bool,
    /// Run log forwarding reconciliation at all
    pub reconcile: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            dry_run: false,
            reconcile: true,
        }
    }
}

/// Result of a transformation that passed every static check.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// The mutated fragment
    pub fragment: Value,
    pub params: TransformParams,
    /// Present when reconciliation ran
    pub report: Option<ReconcileReport>,
}

impl Outcome {
    /// Aggregated reconciliation error, if any unit failed.
    pub fn reconciliation_error(&self) -> Option<Error> {
        let failures = self.report.as_ref()?.failures();
        (!failures.is_empty()).then_some(Error::Reconciliation { failures })
    }
}

/// Runs invocations against an optional logging-service client.
pub struct Transformer<'a> {
    client: Option<&'a Client>,
    options: TransformOptions,
}

impl<'a> Transformer<'a> {
    pub fn new(options: TransformOptions) -> Self {
        Self {
            client: None,
            options,
        }
    }

    /// Use a client for log forwarding.
    pub fn with_client(mut self, client: &'a Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Handle an invocation, always producing a response.
    pub fn handle(&self, mut request: MacroRequest) -> MacroResponse {
        let request_id = std::mem::take(&mut request.request_id);
        MacroResponse::from_result(request_id, self.run(request))
    }

    /// Transform a request.
    ///
    /// Static failures (validation, missing layer version, missing stack name)
    /// are returned as errors. Reconciliation failures are reported in
    /// [`Outcome::report`] alongside the mutated fragment.
    pub fn run(&self, request: MacroRequest) -> Result<Outcome> {
        let MacroRequest {
            region,
            account_id,
            fragment,
            params,
            template_parameter_values,
            ..
        } = request;

        let mut template = Template::from_fragment(fragment)?;
        let params = TransformParams::resolve(&params, template.mapping_parameters())?;
        let functions = template.functions();
        log::info!(
            "transforming {} function(s), {} instrumented",
            functions.len(),
            functions.iter().filter(|f| f.is_instrumented()).count()
        );

        if params.add_layers {
            let target = LayerTarget {
                region: &region,
                account_id: &account_id,
            };
            let added = add_layers(&mut template, &functions, &params, target)?;
            log::debug!("added {added} layer(s)");
        }

        if params.enable_xray_tracing {
            let changes = enable_tracing(&mut template, &functions)?;
            log::debug!(
                "enabled tracing on {} function(s), {} role(s)",
                changes.functions.len(),
                changes.roles.len()
            );
        }

        add_service_and_env_tags(
            &mut template,
            &functions,
            params.service.as_deref(),
            params.env.as_deref(),
        )?;
        add_environment(&mut template, &functions, &params)?;

        let report = match &params.forwarder_arn {
            Some(destination_arn) if self.options.reconcile => {
                let scope = Scope {
                    region: &region,
                    account_id: &account_id,
                    stack_name: params.stack_name.as_deref(),
                    parameters: &template_parameter_values,
                    resources: template.resources(),
                };
                let definitions = forwarder::resolve_log_groups(&template, &functions, &scope)?;
                let client = self.client.ok_or(Error::NoClient)?;
                let units = LogSubscription::plan(&definitions);
                let ctx = ReconcileContext {
                    client,
                    destination_arn,
                    filter_name: &params.subscription_filter_name,
                    dry_run: self.options.dry_run,
                };
                let report = forwarder::reconcile(&units, &ctx, self.options.jobs)?;
                log::info!(
                    "log forwarding: {} created, {} subscribed, {} unchanged, {} skipped, {} failed",
                    report.summary.created,
                    report.summary.modified,
                    report.summary.no_change,
                    report.summary.skipped,
                    report.summary.failed
                );
                Some(report)
            }
            _ => None,
        };

        Ok(Outcome {
            fragment: template.into_fragment(),
            params,
            report,
        })
    }
}
