//! Environment variables for the instrumentation libraries.

use crate::error::{Error, Result};
use crate::params::TransformParams;
use crate::template::{FunctionResource, Template};
use serde_json::{Map, Value};

pub const SITE_VAR: &str = "DD_SITE";
pub const FLUSH_TO_LOG_VAR: &str = "DD_FLUSH_TO_LOG";
pub const LOG_LEVEL_VAR: &str = "DD_LOG_LEVEL";
pub const ENHANCED_METRICS_VAR: &str = "DD_ENHANCED_METRICS";
pub const TRACE_ENABLED_VAR: &str = "DD_TRACE_ENABLED";
pub const MERGE_XRAY_TRACES_VAR: &str = "DD_MERGE_XRAY_TRACES";

/// Variables implied by the options, in insertion order.
pub fn desired_variables(params: &TransformParams) -> Vec<(&'static str, String)> {
    let mut vars = vec![
        (SITE_VAR, params.site.clone()),
        (FLUSH_TO_LOG_VAR, params.flush_metrics_to_logs.to_string()),
    ];
    if let Some(level) = &params.log_level {
        vars.push((LOG_LEVEL_VAR, level.clone()));
    }
    vars.push((ENHANCED_METRICS_VAR, params.enable_enhanced_metrics.to_string()));
    vars.push((TRACE_ENABLED_VAR, params.enable_dd_tracing.to_string()));
    if params.enable_xray_tracing && params.enable_dd_tracing {
        vars.push((MERGE_XRAY_TRACES_VAR, "true".to_string()));
    }
    vars
}

/// Set environment variables on instrumented functions.
///
/// Variables the function already defines are never overwritten. Returns the
/// number of variables set.
pub fn add_environment(
    template: &mut Template,
    functions: &[FunctionResource],
    params: &TransformParams,
) -> Result<usize> {
    let desired = desired_variables(params);
    let mut added = 0;

    for function in functions.iter().filter(|f| f.is_instrumented()) {
        let Some(props) = template.properties_mut(&function.key) else {
            continue;
        };
        let variables = props
            .entry("Environment")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| {
                Error::Validation(format!("{}: Environment must be an object", function.key))
            })?
            .entry("Variables")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| {
                Error::Validation(format!(
                    "{}: Environment.Variables must be an object",
                    function.key
                ))
            })?;

        for (name, value) in &desired {
            if !variables.contains_key(*name) {
                variables.insert((*name).to_string(), Value::String(value.clone()));
                added += 1;
            }
        }
    }
    Ok(added)
}
