//! X-Ray tracing wiring.
//!
//! Functions without a `TracingConfig` get active tracing, and the role they
//! execute under gets a policy allowing trace segments to be written. Roles
//! shared by several functions receive the policy once.

use crate::error::Result;
use crate::template::{FunctionResource, Template, list_property};
use serde_json::{Value, json};

/// Name of the policy added to execution roles.
pub const XRAY_POLICY_NAME: &str = "XRayTracingWritePolicy";

const XRAY_ACTIONS: [&str; 2] = ["xray:PutTraceSegments", "xray:PutTelemetryRecords"];

/// Summary of what tracing changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TracingChanges {
    /// Functions that got `TracingConfig`
    pub functions: Vec<String>,
    /// Roles that got the X-Ray policy
    pub roles: Vec<String>,
}

fn xray_policy() -> Value {
    json!({
        "PolicyName": XRAY_POLICY_NAME,
        "PolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Action": XRAY_ACTIONS,
                "Resource": ["*"]
            }]
        }
    })
}

/// Whether a policy list already grants the X-Ray write actions.
fn has_xray_policy(policies: &[Value]) -> bool {
    policies.iter().any(|policy| {
        if policy.get("PolicyName").and_then(Value::as_str) == Some(XRAY_POLICY_NAME) {
            return true;
        }
        let statements = policy
            .pointer("/PolicyDocument/Statement")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        statements.iter().any(|statement| {
            let actions: Vec<&str> = match statement.get("Action") {
                Some(Value::String(a)) => vec![a.as_str()],
                Some(Value::Array(a)) => a.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            XRAY_ACTIONS.iter().all(|needed| actions.contains(needed))
        })
    })
}

/// Enable active tracing on instrumented functions.
pub fn enable_tracing(
    template: &mut Template,
    functions: &[FunctionResource],
) -> Result<TracingChanges> {
    let mut changes = TracingChanges::default();

    for function in functions.iter().filter(|f| f.is_instrumented()) {
        let Some(props) = template.properties_mut(&function.key) else {
            continue;
        };
        if props.contains_key("TracingConfig") {
            log::debug!("{}: TracingConfig already set", function.key);
            continue;
        }
        props.insert("TracingConfig".to_string(), json!({ "Mode": "Active" }));
        changes.functions.push(function.key.clone());

        let Some(role_key) = &function.role_key else {
            log::debug!(
                "{}: execution role is not declared in the template",
                function.key
            );
            continue;
        };
        let Some(role_props) = template.properties_mut(role_key) else {
            continue;
        };
        let policies = list_property(role_props, "Policies")?;
        if !has_xray_policy(policies) {
            log::debug!("{role_key}: adding X-Ray policy");
            policies.push(xray_policy());
            changes.roles.push(role_key.clone());
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::tests::sample_fragment;

    #[test]
    fn test_enable_tracing() {
        let mut template = Template::from_fragment(sample_fragment()).unwrap();
        let functions = template.functions();

        let changes = enable_tracing(&mut template, &functions).unwrap();
        assert_eq!(changes.functions, ["NodeFunction", "PythonFunction"]);
        // Both functions share one role.
        assert_eq!(changes.roles, ["FunctionRole"]);

        assert_eq!(
            template.properties("NodeFunction").unwrap()["TracingConfig"],
            json!({ "Mode": "Active" })
        );
        assert!(!template.properties("JavaFunction").unwrap().contains_key("TracingConfig"));

        let policies = template.properties("FunctionRole").unwrap()["Policies"].clone();
        assert_eq!(policies.as_array().unwrap().len(), 1);
        assert_eq!(policies[0]["PolicyName"], json!(XRAY_POLICY_NAME));
    }

    #[test]
    fn test_short_form_get_att_role_gets_policy() {
        let mut fragment = sample_fragment();
        let node = fragment["Resources"]["NodeFunction"]["Properties"]
            .as_object_mut()
            .unwrap();
        node.remove("Role");
        let mut template = Template::from_fragment(fragment).unwrap();
        let functions = template.functions();

        // Only PythonFunction references the role, as `Fn::GetAtt: Role.Arn`.
        let changes = enable_tracing(&mut template, &functions).unwrap();
        assert_eq!(changes.roles, ["FunctionRole"]);
        assert!(template.properties("FunctionRole").unwrap().contains_key("Policies"));
    }

    #[test]
    fn test_existing_tracing_config_is_kept() {
        let mut fragment = sample_fragment();
        fragment["Resources"]["NodeFunction"]["Properties"]["TracingConfig"] =
            json!({ "Mode": "PassThrough" });
        let mut template = Template::from_fragment(fragment).unwrap();
        let functions = template.functions();

        let changes = enable_tracing(&mut template, &functions).unwrap();
        assert_eq!(changes.functions, ["PythonFunction"]);
        assert_eq!(
            template.properties("NodeFunction").unwrap()["TracingConfig"],
            json!({ "Mode": "PassThrough" })
        );
    }

    #[test]
    fn test_existing_policy_detected() {
        let mut fragment = sample_fragment();
        fragment["Resources"]["FunctionRole"]["Properties"]["Policies"] = json!([{
            "PolicyName": "Custom",
            "PolicyDocument": {
                "Statement": [{
                    "Effect": "Allow",
                    "Action": ["xray:PutTelemetryRecords", "xray:PutTraceSegments", "s3:GetObject"],
                    "Resource": "*"
                }]
            }
        }]);
        let mut template = Template::from_fragment(fragment).unwrap();
        let functions = template.functions();

        let changes = enable_tracing(&mut template, &functions).unwrap();
        assert!(changes.roles.is_empty());
        assert_eq!(
            template.properties("FunctionRole").unwrap()["Policies"]
                .as_array()
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_rerun_is_noop() {
        let mut template = Template::from_fragment(sample_fragment()).unwrap();
        let functions = template.functions();

        enable_tracing(&mut template, &functions).unwrap();
        let before = template.clone();
        let changes = enable_tracing(&mut template, &functions).unwrap();
        assert_eq!(changes, TracingChanges::default());
        assert_eq!(template, before);
    }
}
