//! Template fragment model.
//!
//! [`Template`] owns the fragment as a `serde_json::Value` and is only
//! constructed through [`Template::from_fragment`], which checks the shape of
//! every resource the engine may later mutate. Mutators can therefore assume
//! `Properties`, `Layers`, `Tags` and `Environment` have the right JSON type.

use crate::error::{Error, Result};
use crate::runtime::{self, Runtime, RuntimeType};
use serde_json::{Map, Value};
use std::sync::LazyLock;

pub const FUNCTION_TYPE: &str = "AWS::Lambda::Function";
pub const ROLE_TYPE: &str = "AWS::IAM::Role";
pub const LOG_GROUP_TYPE: &str = "AWS::Logs::LogGroup";

/// Template mapping holding fallback options (`Mappings.<name>.Parameters`).
pub const OPTIONS_MAPPING: &str = "Stackweave";

/// A function resource, as classified at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResource {
    /// Logical key in `Resources`
    pub key: String,
    /// Recognized runtime, if any
    pub runtime: Option<Runtime>,
    pub runtime_type: RuntimeType,
    pub runtime_version: String,
    /// Raw `FunctionName` property
    pub function_name: Option<Value>,
    /// Key of the IAM role declared in this template, if the function uses one
    pub role_key: Option<String>,
}

impl FunctionResource {
    /// Whether layers, tracing and environment apply to this function.
    pub fn is_instrumented(&self) -> bool {
        self.runtime_type.is_instrumented()
    }
}

/// A validated template fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    fragment: Value,
}

impl Template {
    /// Validate a fragment and wrap it.
    pub fn from_fragment(fragment: Value) -> Result<Self> {
        let root = fragment
            .as_object()
            .ok_or_else(|| Error::Validation("fragment must be a JSON object".to_string()))?;
        let resources = root
            .get("Resources")
            .ok_or_else(|| Error::Validation("fragment has no Resources".to_string()))?
            .as_object()
            .ok_or_else(|| Error::Validation("Resources must be an object".to_string()))?;

        for (key, resource) in resources {
            validate_resource(key, resource)?;
        }

        Ok(Self { fragment })
    }

    /// Consume the template, returning the (possibly mutated) fragment.
    pub fn into_fragment(self) -> Value {
        self.fragment
    }

    /// The `Resources` map.
    pub fn resources(&self) -> &Map<String, Value> {
        static EMPTY: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);
        self.fragment
            .get("Resources")
            .and_then(Value::as_object)
            .unwrap_or(&EMPTY)
    }

    /// `Type` of a resource.
    pub fn resource_type(&self, key: &str) -> Option<&str> {
        self.resources().get(key)?.get("Type")?.as_str()
    }

    /// Keys of every resource with the given type, in template order.
    pub fn keys_of_type(&self, resource_type: &str) -> Vec<String> {
        self.resources()
            .iter()
            .filter(|(_, r)| r.get("Type").and_then(Value::as_str) == Some(resource_type))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// `Properties` of a resource.
    pub fn properties(&self, key: &str) -> Option<&Map<String, Value>> {
        self.resources().get(key)?.get("Properties")?.as_object()
    }

    /// Mutable `Properties` of a resource, created if absent.
    pub fn properties_mut(&mut self, key: &str) -> Option<&mut Map<String, Value>> {
        self.fragment
            .get_mut("Resources")?
            .get_mut(key)?
            .as_object_mut()?
            .entry("Properties")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
    }

    /// Options from `Mappings.Stackweave.Parameters`.
    pub fn mapping_parameters(&self) -> Option<&Map<String, Value>> {
        self.fragment
            .get("Mappings")?
            .get(OPTIONS_MAPPING)?
            .get("Parameters")?
            .as_object()
    }

    /// Every function resource, in template order.
    pub fn functions(&self) -> Vec<FunctionResource> {
        self.keys_of_type(FUNCTION_TYPE)
            .into_iter()
            .map(|key| {
                let props = self.properties(&key);
                let raw_runtime = props.and_then(|p| p.get("Runtime")).and_then(Value::as_str);
                let (runtime_type, runtime_version) = runtime::classify(raw_runtime);
                let role_key = props
                    .and_then(|p| p.get("Role"))
                    .and_then(role_reference)
                    .filter(|role| self.resource_type(role) == Some(ROLE_TYPE));

                FunctionResource {
                    runtime: raw_runtime.and_then(Runtime::parse),
                    runtime_type,
                    runtime_version,
                    function_name: props.and_then(|p| p.get("FunctionName")).cloned(),
                    role_key,
                    key,
                }
            })
            .collect()
    }
}

/// Logical key referenced by a function's `Role` property.
///
/// Literal ARNs reference nothing in the template.
fn role_reference(role: &Value) -> Option<String> {
    let map = role.as_object()?;
    if let Some(target) = map.get("Ref") {
        return target.as_str().map(str::to_string);
    }
    match map.get("Fn::GetAtt")? {
        Value::Array(parts) => parts.first()?.as_str().map(str::to_string),
        Value::String(dotted) => dotted.split_once('.').map(|(key, _)| key.to_string()),
        _ => None,
    }
}

fn validate_resource(key: &str, resource: &Value) -> Result<()> {
    let invalid = |what: &str| Error::Validation(format!("resource {key}: {what}"));

    let resource = resource
        .as_object()
        .ok_or_else(|| invalid("must be an object"))?;
    let resource_type = resource
        .get("Type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing string Type"))?;

    let Some(props) = resource.get("Properties") else {
        return Ok(());
    };
    let props = props
        .as_object()
        .ok_or_else(|| invalid("Properties must be an object"))?;

    match resource_type {
        FUNCTION_TYPE => {
            for field in ["Layers", "Tags"] {
                if props.get(field).is_some_and(|v| !v.is_array()) {
                    return Err(invalid(&format!("{field} must be a list")));
                }
            }
            if let Some(environment) = props.get("Environment") {
                let environment = environment
                    .as_object()
                    .ok_or_else(|| invalid("Environment must be an object"))?;
                if environment.get("Variables").is_some_and(|v| !v.is_object()) {
                    return Err(invalid("Environment.Variables must be an object"));
                }
            }
        }
        ROLE_TYPE => {
            if props.get("Policies").is_some_and(|v| !v.is_array()) {
                return Err(invalid("Policies must be a list"));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Mutable list property, created if absent.
pub(crate) fn list_property<'a>(
    props: &'a mut Map<String, Value>,
    name: &str,
) -> Result<&'a mut Vec<Value>> {
    props
        .entry(name)
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| Error::Validation(format!("{name} must be a list")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Small template with one function per family plus a role and log group.
    pub(crate) fn sample_fragment() -> Value {
        json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Resources": {
                "NodeFunction": {
                    "Type": "AWS::Lambda::Function",
                    "Properties": {
                        "Handler": "index.handler",
                        "Runtime": "nodejs18.x",
                        "Role": { "Fn::GetAtt": ["FunctionRole", "Arn"] }
                    }
                },
                "PythonFunction": {
                    "Type": "AWS::Lambda::Function",
                    "Properties": {
                        "Handler": "app.handler",
                        "Runtime": "python3.11",
                        "FunctionName": "orders-worker",
                        "Role": { "Fn::GetAtt": "FunctionRole.Arn" }
                    }
                },
                "JavaFunction": {
                    "Type": "AWS::Lambda::Function",
                    "Properties": {
                        "Handler": "com.example.Handler",
                        "Runtime": "java17",
                        "Role": "arn:aws:iam::123456789012:role/external"
                    }
                },
                "FunctionRole": {
                    "Type": "AWS::IAM::Role",
                    "Properties": { "AssumeRolePolicyDocument": {} }
                }
            }
        })
    }

    #[test]
    fn test_functions_are_classified() {
        let template = Template::from_fragment(sample_fragment()).unwrap();
        let functions = template.functions();

        let keys: Vec<_> = functions.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["NodeFunction", "PythonFunction", "JavaFunction"]);

        assert_eq!(functions[0].runtime_type, RuntimeType::Node);
        assert_eq!(functions[0].runtime_version, "18.x");
        assert_eq!(functions[0].role_key.as_deref(), Some("FunctionRole"));
        assert_eq!(functions[1].role_key.as_deref(), Some("FunctionRole"));
        assert_eq!(functions[1].function_name, Some(json!("orders-worker")));
        assert_eq!(functions[2].runtime_type, RuntimeType::Other);
        assert_eq!(functions[2].role_key, None);
    }

    #[test]
    fn test_role_reference_forms() {
        assert_eq!(role_reference(&json!({ "Ref": "R" })), Some("R".to_string()));
        assert_eq!(
            role_reference(&json!({ "Fn::GetAtt": ["R", "Arn"] })),
            Some("R".to_string())
        );
        assert_eq!(
            role_reference(&json!({ "Fn::GetAtt": "R.Arn" })),
            Some("R".to_string())
        );
        assert_eq!(role_reference(&json!("arn:aws:iam::1:role/x")), None);
    }

    #[test]
    fn test_invalid_fragments() {
        assert!(Template::from_fragment(json!([])).is_err());
        assert!(Template::from_fragment(json!({})).is_err());
        assert!(Template::from_fragment(json!({ "Resources": [] })).is_err());
        assert!(
            Template::from_fragment(json!({ "Resources": { "A": { "Properties": {} } } })).is_err()
        );

        let err = Template::from_fragment(json!({
            "Resources": {
                "F": { "Type": "AWS::Lambda::Function", "Properties": { "Layers": "arn" } }
            }
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("Layers must be a list")));
    }

    #[test]
    fn test_properties_mut_creates_properties() {
        let mut template = Template::from_fragment(json!({
            "Resources": { "F": { "Type": "AWS::Lambda::Function" } }
        }))
        .unwrap();

        template
            .properties_mut("F")
            .unwrap()
            .insert("Timeout".to_string(), json!(30));
        assert_eq!(template.properties("F").unwrap()["Timeout"], json!(30));
        assert!(template.properties_mut("Missing").is_none());
    }

    #[test]
    fn test_mapping_parameters() {
        let template = Template::from_fragment(json!({
            "Mappings": { "Stackweave": { "Parameters": { "service": "api" } } },
            "Resources": {}
        }))
        .unwrap();
        assert_eq!(template.mapping_parameters().unwrap()["service"], json!("api"));
    }
}
