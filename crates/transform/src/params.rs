//! Typed view of the recognized transformation options.
//!
//! Options come from the request `params`, then the template's
//! `Mappings.Stackweave.Parameters`, then defaults. CloudFormation hands
//! parameters over as strings, so booleans and numbers also accept their
//! string forms.

use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// Sites accepted for `DD_SITE`.
pub const KNOWN_SITES: [&str; 6] = [
    "datadoghq.com",
    "datadoghq.eu",
    "us3.datadoghq.com",
    "us5.datadoghq.com",
    "ap1.datadoghq.com",
    "ddog-gov.com",
];

pub const DEFAULT_SITE: &str = "datadoghq.com";

const KNOWN_OPTIONS: [&str; 15] = [
    "site",
    "addLayers",
    "nodeLayerVersion",
    "pythonLayerVersion",
    "extensionLayerVersion",
    "enableXrayTracing",
    "forwarderArn",
    "stackName",
    "service",
    "env",
    "flushMetricsToLogs",
    "logLevel",
    "enableEnhancedMetrics",
    "enableDDTracing",
    "subscriptionFilterName",
];

/// Name given to subscription filters created for the forwarder.
pub const DEFAULT_FILTER_NAME: &str = "datadog-forwarder";

/// Recognized options after precedence and defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformParams {
    pub site: String,
    pub add_layers: bool,
    pub node_layer_version: Option<u64>,
    pub python_layer_version: Option<u64>,
    pub extension_layer_version: Option<u64>,
    pub enable_xray_tracing: bool,
    pub forwarder_arn: Option<String>,
    pub stack_name: Option<String>,
    pub service: Option<String>,
    pub env: Option<String>,
    pub flush_metrics_to_logs: bool,
    pub log_level: Option<String>,
    pub enable_enhanced_metrics: bool,
    pub enable_dd_tracing: bool,
    pub subscription_filter_name: String,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            site: DEFAULT_SITE.to_string(),
            add_layers: true,
            node_layer_version: None,
            python_layer_version: None,
            extension_layer_version: None,
            enable_xray_tracing: true,
            forwarder_arn: None,
            stack_name: None,
            service: None,
            env: None,
            flush_metrics_to_logs: true,
            log_level: None,
            enable_enhanced_metrics: true,
            enable_dd_tracing: true,
            subscription_filter_name: DEFAULT_FILTER_NAME.to_string(),
        }
    }
}

/// Two-level option lookup.
struct Sources<'a> {
    params: &'a Map<String, Value>,
    mapping: Option<&'a Map<String, Value>>,
}

impl Sources<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        let present = |v: &&Value| !v.is_null();
        self.params
            .get(name)
            .filter(present)
            .or_else(|| self.mapping.and_then(|m| m.get(name)).filter(present))
    }

    fn bool(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(invalid_option(name, "a boolean", s)),
            },
            Some(other) => Err(invalid_option(name, "a boolean", &other.to_string())),
        }
    }

    fn version(&self, name: &str) -> Result<Option<u64>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid_option(name, "a positive integer", &n.to_string())),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid_option(name, "a positive integer", s)),
            Some(other) => Err(invalid_option(name, "a positive integer", &other.to_string())),
        }
    }

    /// String option; empty strings count as unset.
    fn string(&self, name: &str) -> Result<Option<String>> {
        let value = match self.get(name) {
            None => return Ok(None),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => return Err(invalid_option(name, "a string", &other.to_string())),
        };
        Ok(Some(value).filter(|s| !s.is_empty()))
    }
}

fn invalid_option(name: &str, expected: &str, got: &str) -> Error {
    Error::Validation(format!("option {name} must be {expected}, got {got}"))
}

impl TransformParams {
    /// Resolve options from request params and the template mapping.
    pub fn resolve(
        params: &Map<String, Value>,
        mapping: Option<&Map<String, Value>>,
    ) -> Result<Self> {
        for key in params.keys().chain(mapping.into_iter().flat_map(Map::keys)) {
            if !KNOWN_OPTIONS.contains(&key.as_str()) {
                log::warn!("ignoring unknown option '{key}'");
            }
        }

        let src = Sources { params, mapping };
        let defaults = Self::default();

        let site = src.string("site")?.unwrap_or(defaults.site);
        if !KNOWN_SITES.contains(&site.as_str()) {
            return Err(Error::Validation(format!(
                "site '{site}' is not one of {}",
                KNOWN_SITES.join(", ")
            )));
        }

        Ok(Self {
            site,
            add_layers: src.bool("addLayers", defaults.add_layers)?,
            node_layer_version: src.version("nodeLayerVersion")?,
            python_layer_version: src.version("pythonLayerVersion")?,
            extension_layer_version: src.version("extensionLayerVersion")?,
            enable_xray_tracing: src.bool("enableXrayTracing", defaults.enable_xray_tracing)?,
            forwarder_arn: src.string("forwarderArn")?,
            stack_name: src.string("stackName")?,
            service: src.string("service")?,
            env: src.string("env")?,
            flush_metrics_to_logs: src.bool("flushMetricsToLogs", defaults.flush_metrics_to_logs)?,
            log_level: src.string("logLevel")?,
            enable_enhanced_metrics: src
                .bool("enableEnhancedMetrics", defaults.enable_enhanced_metrics)?,
            enable_dd_tracing: src.bool("enableDDTracing", defaults.enable_dd_tracing)?,
            subscription_filter_name: src
                .string("subscriptionFilterName")?
                .unwrap_or(defaults.subscription_filter_name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults() {
        let params = TransformParams::resolve(&Map::new(), None).unwrap();
        assert_eq!(params, TransformParams::default());
        assert!(params.add_layers);
        assert!(params.enable_xray_tracing);
        assert_eq!(params.site, "datadoghq.com");
    }

    #[test]
    fn test_params_override_mapping() {
        let params = map(json!({ "service": "from-params", "addLayers": "false" }));
        let mapping = map(json!({
            "service": "from-mapping",
            "env": "staging",
            "nodeLayerVersion": 112
        }));

        let resolved = TransformParams::resolve(&params, Some(&mapping)).unwrap();
        assert_eq!(resolved.service.as_deref(), Some("from-params"));
        assert_eq!(resolved.env.as_deref(), Some("staging"));
        assert_eq!(resolved.node_layer_version, Some(112));
        assert!(!resolved.add_layers);
    }

    #[test]
    fn test_string_forms() {
        let params = map(json!({
            "pythonLayerVersion": "96",
            "enableXrayTracing": "FALSE",
            "stackName": "",
            "site": "datadoghq.eu"
        }));
        let resolved = TransformParams::resolve(&params, None).unwrap();
        assert_eq!(resolved.python_layer_version, Some(96));
        assert!(!resolved.enable_xray_tracing);
        assert_eq!(resolved.stack_name, None);
        assert_eq!(resolved.site, "datadoghq.eu");
    }

    #[test]
    fn test_invalid_values() {
        for params in [
            json!({ "addLayers": "yes" }),
            json!({ "nodeLayerVersion": "latest" }),
            json!({ "nodeLayerVersion": -1 }),
            json!({ "site": "example.com" }),
            json!({ "service": ["a"] }),
        ] {
            let err = TransformParams::resolve(&map(params.clone()), None).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{params} should be rejected");
        }
    }
}
