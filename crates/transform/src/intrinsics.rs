//! Best-effort evaluation of CloudFormation intrinsic functions.
//!
//! Only what naming needs is supported: literals, `Ref` (pseudo parameters,
//! template parameters, resources), `Fn::Sub` and `Fn::Join`. A reference to a
//! resource is kept symbolic as [`Piece::Resource`] because its physical name
//! is only known at deploy time.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static SUB_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("static regex"));

/// A fragment of a resolved string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    /// Physical name of a resource in the same template
    Resource(String),
}

/// Why a value could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// `AWS::StackName` was referenced but no stack name is known
    StackName,
    /// Anything else (unknown intrinsic, attribute access, unknown reference)
    Unsupported(String),
}

/// Values available while resolving.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub region: &'a str,
    pub account_id: &'a str,
    pub stack_name: Option<&'a str>,
    /// `templateParameterValues` from the invocation
    pub parameters: &'a Map<String, Value>,
    /// The template's `Resources` map
    pub resources: &'a Map<String, Value>,
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Result<Piece, Unresolved> {
        let text = |s: &str| Ok(Piece::Text(s.to_string()));
        match name {
            "AWS::StackName" => self
                .stack_name
                .map_or(Err(Unresolved::StackName), text),
            "AWS::Region" => text(self.region),
            "AWS::AccountId" => text(self.account_id),
            "AWS::Partition" => text(partition(self.region)),
            "AWS::URLSuffix" => text(if self.region.starts_with("cn-") {
                "amazonaws.com.cn"
            } else {
                "amazonaws.com"
            }),
            _ => {
                if let Some(value) = self.parameters.get(name) {
                    return match value {
                        Value::String(s) => text(s),
                        Value::Number(n) => text(&n.to_string()),
                        _ => Err(Unresolved::Unsupported(format!(
                            "parameter {name} is not a scalar"
                        ))),
                    };
                }
                if self.resources.contains_key(name) {
                    return Ok(Piece::Resource(name.to_string()));
                }
                Err(Unresolved::Unsupported(format!("unknown reference {name}")))
            }
        }
    }
}

/// AWS partition for a region.
pub fn partition(region: &str) -> &'static str {
    if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else if region.starts_with("cn-") {
        "aws-cn"
    } else {
        "aws"
    }
}

/// Resolve a value into pieces.
pub fn resolve(value: &Value, scope: &Scope) -> Result<Vec<Piece>, Unresolved> {
    let pieces = match value {
        Value::String(s) => vec![Piece::Text(s.clone())],
        Value::Number(n) => vec![Piece::Text(n.to_string())],
        Value::Object(map) if map.len() == 1 => {
            let Some((name, arg)) = map.iter().next() else {
                return Err(Unresolved::Unsupported("empty object".to_string()));
            };
            match name.as_str() {
                "Ref" => {
                    let target = arg.as_str().ok_or_else(|| {
                        Unresolved::Unsupported("Ref target must be a string".to_string())
                    })?;
                    vec![scope.lookup(target)?]
                }
                "Fn::Sub" => resolve_sub(arg, scope)?,
                "Fn::Join" => resolve_join(arg, scope)?,
                other => return Err(Unresolved::Unsupported(format!("{other} is not supported"))),
            }
        }
        _ => return Err(Unresolved::Unsupported(format!("cannot resolve {value}"))),
    };
    Ok(merge_text(pieces))
}

/// Resolve a value that must not reference any resource.
pub fn resolve_text(value: &Value, scope: &Scope) -> Result<String, Unresolved> {
    let mut out = String::new();
    for piece in resolve(value, scope)? {
        match piece {
            Piece::Text(s) => out.push_str(&s),
            Piece::Resource(key) => {
                return Err(Unresolved::Unsupported(format!(
                    "depends on the physical name of {key}"
                )));
            }
        }
    }
    Ok(out)
}

fn resolve_sub(arg: &Value, scope: &Scope) -> Result<Vec<Piece>, Unresolved> {
    let (template, variables) = match arg {
        Value::String(s) => (s.as_str(), None),
        Value::Array(items) if items.len() == 2 => {
            let template = items[0].as_str().ok_or_else(|| {
                Unresolved::Unsupported("Fn::Sub template must be a string".to_string())
            })?;
            (template, items[1].as_object())
        }
        _ => return Err(Unresolved::Unsupported("malformed Fn::Sub".to_string())),
    };

    let mut pieces = Vec::new();
    let mut last = 0;
    for caps in SUB_VARIABLE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        pieces.push(Piece::Text(template[last..whole.start()].to_string()));
        last = whole.end();

        let name = name.as_str().trim();
        if let Some(literal) = name.strip_prefix('!') {
            pieces.push(Piece::Text(format!("${{{literal}}}")));
        } else if let Some(value) = variables.and_then(|v| v.get(name)) {
            pieces.extend(resolve(value, scope)?);
        } else if name.contains('.') && !name.starts_with("AWS::") {
            return Err(Unresolved::Unsupported(format!(
                "attribute reference ${{{name}}} is not supported"
            )));
        } else {
            pieces.push(scope.lookup(name)?);
        }
    }
    pieces.push(Piece::Text(template[last..].to_string()));
    Ok(pieces)
}

fn resolve_join(arg: &Value, scope: &Scope) -> Result<Vec<Piece>, Unresolved> {
    let malformed = || Unresolved::Unsupported("malformed Fn::Join".to_string());
    let items = arg.as_array().filter(|a| a.len() == 2).ok_or_else(malformed)?;
    let delimiter = items[0].as_str().ok_or_else(malformed)?;
    let values = items[1].as_array().ok_or_else(malformed)?;

    let mut pieces = Vec::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            pieces.push(Piece::Text(delimiter.to_string()));
        }
        pieces.extend(resolve(value, scope)?);
    }
    Ok(pieces)
}

/// Drop empty text pieces and concatenate adjacent ones.
fn merge_text(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut merged: Vec<Piece> = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match (merged.last_mut(), piece) {
            (_, Piece::Text(s)) if s.is_empty() => {}
            (Some(Piece::Text(prev)), Piece::Text(s)) => prev.push_str(&s),
            (_, piece) => merged.push(piece),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_scope<R>(stack_name: Option<&str>, f: impl FnOnce(&Scope) -> R) -> R {
        let parameters = json!({ "Stage": "prod", "Memory": 512 });
        let resources = json!({ "ApiFunction": { "Type": "AWS::Lambda::Function" } });
        let scope = Scope {
            region: "us-east-1",
            account_id: "123456789012",
            stack_name,
            parameters: parameters.as_object().unwrap(),
            resources: resources.as_object().unwrap(),
        };
        f(&scope)
    }

    #[test]
    fn test_resolve_literal_and_parameters() {
        with_scope(None, |scope| {
            assert_eq!(resolve_text(&json!("plain"), scope).unwrap(), "plain");
            assert_eq!(resolve_text(&json!({ "Ref": "Stage" }), scope).unwrap(), "prod");
            assert_eq!(resolve_text(&json!({ "Ref": "Memory" }), scope).unwrap(), "512");
            assert_eq!(
                resolve_text(&json!({ "Ref": "AWS::Partition" }), scope).unwrap(),
                "aws"
            );
        });
    }

    #[test]
    fn test_resolve_sub() {
        with_scope(Some("orders"), |scope| {
            let value = json!({ "Fn::Sub": "${AWS::StackName}-${Stage}-api" });
            assert_eq!(resolve_text(&value, scope).unwrap(), "orders-prod-api");

            let value = json!({
                "Fn::Sub": ["${Prefix}-worker", { "Prefix": { "Ref": "Stage" } }]
            });
            assert_eq!(resolve_text(&value, scope).unwrap(), "prod-worker");

            let value = json!({ "Fn::Sub": "cost-${!Literal}" });
            assert_eq!(resolve_text(&value, scope).unwrap(), "cost-${Literal}");
        });
    }

    #[test]
    fn test_resolve_stack_name_missing() {
        with_scope(None, |scope| {
            let value = json!({ "Fn::Sub": "${AWS::StackName}-api" });
            assert_eq!(resolve_text(&value, scope), Err(Unresolved::StackName));
        });
    }

    #[test]
    fn test_resolve_resource_reference() {
        with_scope(None, |scope| {
            let value = json!({ "Fn::Join": ["", ["/aws/lambda/", { "Ref": "ApiFunction" }]] });
            assert_eq!(
                resolve(&value, scope).unwrap(),
                vec![
                    Piece::Text("/aws/lambda/".to_string()),
                    Piece::Resource("ApiFunction".to_string())
                ]
            );

            let value = json!({ "Fn::Sub": "/aws/lambda/${ApiFunction}" });
            assert_eq!(resolve(&value, scope).unwrap().len(), 2);
            assert!(resolve_text(&value, scope).is_err());
        });
    }

    #[test]
    fn test_resolve_unsupported() {
        with_scope(None, |scope| {
            assert!(matches!(
                resolve(&json!({ "Fn::GetAtt": ["ApiFunction", "Arn"] }), scope),
                Err(Unresolved::Unsupported(_))
            ));
            assert!(matches!(
                resolve(&json!({ "Fn::Sub": "${ApiFunction.Arn}" }), scope),
                Err(Unresolved::Unsupported(_))
            ));
            assert!(matches!(
                resolve(&json!({ "Ref": "Nope" }), scope),
                Err(Unresolved::Unsupported(_))
            ));
        });
    }

    #[test]
    fn test_partition() {
        assert_eq!(partition("us-gov-west-1"), "aws-us-gov");
        assert_eq!(partition("cn-north-1"), "aws-cn");
        assert_eq!(partition("eu-central-1"), "aws");
    }
}
