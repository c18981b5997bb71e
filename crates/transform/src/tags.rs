//! Service and environment tags.

use crate::error::Result;
use crate::template::{FunctionResource, Template, list_property};
use serde_json::{Value, json};

/// Add `service` and `env` tags to every function.
///
/// Tags already present on a function win; missing ones are appended in
/// `service`, `env` order. Without either label nothing is touched, not even
/// an empty `Tags` list. Returns the number of tags added.
pub fn add_service_and_env_tags(
    template: &mut Template,
    functions: &[FunctionResource],
    service: Option<&str>,
    env: Option<&str>,
) -> Result<usize> {
    let labels: Vec<(&str, &str)> = [("service", service), ("env", env)]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();
    if labels.is_empty() {
        return Ok(0);
    }

    let mut added = 0;
    for function in functions {
        let Some(props) = template.properties_mut(&function.key) else {
            continue;
        };
        let tags = list_property(props, "Tags")?;
        for (key, value) in &labels {
            let exists = tags
                .iter()
                .any(|tag| tag.get("Key").and_then(Value::as_str) == Some(*key));
            if !exists {
                tags.push(json!({ "Key": key, "Value": value }));
                added += 1;
            }
        }
    }
    Ok(added)
}
