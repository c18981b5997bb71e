//! Instrumentation layer injection.

use crate::error::{Error, Result};
use crate::intrinsics::partition;
use crate::params::TransformParams;
use crate::runtime::RuntimeType;
use crate::template::{FunctionResource, Template, list_property};
use serde_json::Value;

/// Layer carrying the monitoring extension.
pub const EXTENSION_LAYER_NAME: &str = "Datadog-Extension";

/// ARN of a published layer version.
pub fn layer_arn(region: &str, account_id: &str, layer_name: &str, version: u64) -> String {
    format!(
        "arn:{}:lambda:{region}:{account_id}:layer:{layer_name}:{version}",
        partition(region)
    )
}

/// Where layers are published.
#[derive(Debug, Clone, Copy)]
pub struct LayerTarget<'a> {
    pub region: &'a str,
    pub account_id: &'a str,
}

/// Append the runtime (and extension) layers to every instrumented function.
///
/// Every function is checked for a layer version before any is mutated, so a
/// missing version leaves the template untouched. Returns the number of ARNs
/// appended.
pub fn add_layers(
    template: &mut Template,
    functions: &[FunctionResource],
    params: &TransformParams,
    target: LayerTarget,
) -> Result<usize> {
    let mut planned = Vec::new();
    for function in functions.iter().filter(|f| f.is_instrumented()) {
        let version = match function.runtime_type {
            RuntimeType::Node => params.node_layer_version,
            RuntimeType::Python => params.python_layer_version,
            RuntimeType::Other => continue,
        };
        let (Some(version), Some(runtime)) = (version, function.runtime) else {
            return Err(Error::MissingLayerVersion {
                function: function.key.clone(),
                runtime: function.runtime_type,
            });
        };

        let mut arns = vec![layer_arn(
            target.region,
            target.account_id,
            runtime.layer_name(),
            version,
        )];
        if let Some(extension) = params.extension_layer_version {
            arns.push(layer_arn(
                target.region,
                target.account_id,
                EXTENSION_LAYER_NAME,
                extension,
            ));
        }
        planned.push((function.key.as_str(), arns));
    }

    let mut added = 0;
    for (key, arns) in planned {
        let Some(props) = template.properties_mut(key) else {
            continue;
        };
        let layers = list_property(props, "Layers")?;
        for arn in arns {
            if layers.iter().any(|l| l.as_str() == Some(arn.as_str())) {
                log::debug!("{key}: layer {arn} already present");
                continue;
            }
            log::debug!("{key}: adding layer {arn}");
            layers.push(Value::String(arn));
            added += 1;
        }
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::tests::sample_fragment;
    use serde_json::json;

    const TARGET: LayerTarget<'static> = LayerTarget {
        region: "us-east-1",
        account_id: "123456789012",
    };

    fn params(node: Option<u64>, python: Option<u64>) -> TransformParams {
        TransformParams {
            node_layer_version: node,
            python_layer_version: python,
            ..TransformParams::default()
        }
    }

    fn layers_of(template: &Template, key: &str) -> Option<Value> {
        template.properties(key).and_then(|p| p.get("Layers")).cloned()
    }

    #[test]
    fn test_layer_arn_partitions() {
        assert_eq!(
            layer_arn("us-east-1", "1", "Datadog-Node18-x", 5),
            "arn:aws:lambda:us-east-1:1:layer:Datadog-Node18-x:5"
        );
        assert_eq!(
            layer_arn("us-gov-west-1", "1", "Datadog-Python311", 5),
            "arn:aws-us-gov:lambda:us-gov-west-1:1:layer:Datadog-Python311:5"
        );
        assert!(layer_arn("cn-north-1", "1", "x", 1).starts_with("arn:aws-cn:"));
    }

    #[test]
    fn test_add_layers_once() {
        let mut template = Template::from_fragment(sample_fragment()).unwrap();
        let functions = template.functions();
        let params = params(Some(112), Some(96));

        assert_eq!(add_layers(&mut template, &functions, &params, TARGET).unwrap(), 2);
        assert_eq!(
            layers_of(&template, "NodeFunction"),
            Some(json!(["arn:aws:lambda:us-east-1:123456789012:layer:Datadog-Node18-x:112"]))
        );
        assert_eq!(
            layers_of(&template, "PythonFunction"),
            Some(json!(["arn:aws:lambda:us-east-1:123456789012:layer:Datadog-Python311:96"]))
        );
        assert_eq!(layers_of(&template, "JavaFunction"), None);

        // A second pass adds nothing.
        assert_eq!(add_layers(&mut template, &functions, &params, TARGET).unwrap(), 0);
        assert_eq!(
            layers_of(&template, "NodeFunction").unwrap().as_array().unwrap().len(),
            1
        );
    }

    #[test]
    fn test_existing_layers_are_kept() {
        let mut fragment = sample_fragment();
        fragment["Resources"]["NodeFunction"]["Properties"]["Layers"] = json!(["arn:custom"]);
        let mut template = Template::from_fragment(fragment).unwrap();
        let functions = template.functions();

        add_layers(&mut template, &functions, &params(Some(1), Some(1)), TARGET).unwrap();
        let layers = layers_of(&template, "NodeFunction").unwrap();
        assert_eq!(layers[0], json!("arn:custom"));
        assert_eq!(layers.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_version_fails_before_mutation() {
        let mut template = Template::from_fragment(sample_fragment()).unwrap();
        let functions = template.functions();

        let node_only = params(Some(112), None);
        let err = add_layers(&mut template, &functions, &node_only, TARGET).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingLayerVersion { ref function, runtime: RuntimeType::Python }
                if function == "PythonFunction"
        ));
        assert!(err.to_string().contains("Python"));
        assert_eq!(layers_of(&template, "NodeFunction"), None);
    }

    #[test]
    fn test_extension_layer() {
        let mut template = Template::from_fragment(sample_fragment()).unwrap();
        let functions = template.functions();
        let params = TransformParams {
            extension_layer_version: Some(65),
            ..params(Some(112), Some(96))
        };

        assert_eq!(add_layers(&mut template, &functions, &params, TARGET).unwrap(), 4);
        let layers = layers_of(&template, "NodeFunction").unwrap();
        assert_eq!(
            layers[1],
            json!("arn:aws:lambda:us-east-1:123456789012:layer:Datadog-Extension:65")
        );
    }
}
