//! Log group name resolution.
//!
//! A function's log group is `/aws/lambda/<function name>`. When the template
//! fixes the function name the log group name is exact; otherwise CloudFormation
//! names the function `<stack>-<LogicalId>-<suffix>`, truncating the stack and
//! logical id parts when the whole name would exceed 64 characters.

use crate::error::{Error, Result};
use crate::intrinsics::{self, Piece, Scope, Unresolved};
use crate::template::{FunctionResource, LOG_GROUP_TYPE, Template};
use std::fmt;

pub const LAMBDA_LOG_GROUP_PREFIX: &str = "/aws/lambda/";

/// Longest function name Lambda accepts.
const MAX_FUNCTION_NAME_LEN: usize = 64;

/// Upper bound of the random suffix CloudFormation appends, with its hyphen.
const GENERATED_SUFFIX_LEN: usize = 14;

/// Leading stack-name characters used to narrow the lookup of a truncated name.
const TRUNCATED_QUERY_LEN: usize = 16;

/// A log group identified by full name, or by the parts of a generated name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogGroupName {
    Exact(String),
    /// Function named at deploy time as `<stack>-<key>-<suffix>`
    Generated { stack: String, key: String },
}

impl LogGroupName {
    pub fn generated(stack: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Generated {
            stack: stack.into(),
            key: key.into(),
        }
    }

    /// Name or prefix passed to `describe_log_groups`.
    pub fn query(&self) -> String {
        match self {
            Self::Exact(name) => name.clone(),
            Self::Generated { stack, key } if !self.is_truncated() => {
                format!("{LAMBDA_LOG_GROUP_PREFIX}{stack}-{key}-")
            }
            Self::Generated { stack, .. } => {
                let head: String = stack.chars().take(TRUNCATED_QUERY_LEN).collect();
                format!("{LAMBDA_LOG_GROUP_PREFIX}{head}")
            }
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }

    /// Whether the platform may have shortened the generated name.
    pub fn is_truncated(&self) -> bool {
        match self {
            Self::Exact(_) => false,
            Self::Generated { stack, key } => {
                stack.len() + 1 + key.len() + GENERATED_SUFFIX_LEN > MAX_FUNCTION_NAME_LEN
            }
        }
    }

    /// Whether a remote log group is the one this name designates.
    ///
    /// A generated name matches `<stack>-<key>-<suffix>` where the suffix is a
    /// single alphanumeric token. When truncation applies, the stack and key
    /// parts may each be cut short.
    pub fn matches(&self, remote: &str) -> bool {
        let (stack, key) = match self {
            Self::Exact(name) => return remote == name,
            Self::Generated { stack, key } => (stack, key),
        };

        let Some(function_name) = remote.strip_prefix(LAMBDA_LOG_GROUP_PREFIX) else {
            return false;
        };
        let Some((head, suffix)) = function_name.rsplit_once('-') else {
            return false;
        };
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return false;
        }

        if !self.is_truncated() {
            return head.strip_prefix(stack.as_str()).and_then(|r| r.strip_prefix('-'))
                == Some(key.as_str());
        }

        function_name.len() <= MAX_FUNCTION_NAME_LEN
            && head.match_indices('-').any(|(at, _)| {
                let (stack_part, key_part) = (&head[..at], &head[at + 1..]);
                !stack_part.is_empty()
                    && !key_part.is_empty()
                    && stack.starts_with(stack_part)
                    && key.starts_with(key_part)
            })
    }
}

impl fmt::Display for LogGroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(name) => f.write_str(name),
            Self::Generated { stack, key } => {
                write!(f, "{LAMBDA_LOG_GROUP_PREFIX}{stack}-{key}-*")
            }
        }
    }
}

/// Log group of one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroupDefinition {
    /// Function key
    pub key: String,
    /// Declaring `AWS::Logs::LogGroup` resource, if any
    pub log_group_resource: Option<String>,
    pub log_group_name: LogGroupName,
}

/// How a declared log group's name relates to the functions.
#[derive(Debug)]
enum DeclaredName {
    Literal(String),
    /// `/aws/lambda/` followed by the physical name of a resource
    FunctionReference(String),
}

fn declared_log_groups(template: &Template, scope: &Scope) -> Vec<(String, DeclaredName)> {
    let mut declared = Vec::new();
    for key in template.keys_of_type(LOG_GROUP_TYPE) {
        let Some(name) = template.properties(&key).and_then(|p| p.get("LogGroupName")) else {
            continue;
        };
        match intrinsics::resolve(name, scope).as_deref() {
            Ok([Piece::Text(literal)]) => {
                declared.push((key, DeclaredName::Literal(literal.clone())));
            }
            Ok([Piece::Text(prefix), Piece::Resource(target)])
                if prefix == LAMBDA_LOG_GROUP_PREFIX =>
            {
                declared.push((key, DeclaredName::FunctionReference(target.clone())));
            }
            Ok(_) => log::debug!("{key}: LogGroupName does not name a function's log group"),
            Err(e) => log::debug!("{key}: cannot resolve LogGroupName: {e:?}"),
        }
    }
    declared
}

/// Function name, when it is fixed by the template.
enum FunctionName {
    Fixed(String),
    Generated,
    NeedsStackName,
}

fn function_name(function: &FunctionResource, scope: &Scope) -> Result<FunctionName> {
    let Some(value) = &function.function_name else {
        return Ok(FunctionName::Generated);
    };
    match intrinsics::resolve_text(value, scope) {
        Ok(name) => Ok(FunctionName::Fixed(name)),
        Err(Unresolved::StackName) => Ok(FunctionName::NeedsStackName),
        Err(Unresolved::Unsupported(reason)) => Err(Error::Validation(format!(
            "{}: cannot determine FunctionName for log forwarding: {reason}",
            function.key
        ))),
    }
}

/// Resolve the log group of every function.
///
/// Fails with [`Error::MissingStackName`] listing every function whose log
/// group name depends on the stack name when `scope.stack_name` is absent,
/// and with [`Error::Validation`] when a `FunctionName` cannot be evaluated.
pub fn resolve_log_groups(
    template: &Template,
    functions: &[FunctionResource],
    scope: &Scope,
) -> Result<Vec<LogGroupDefinition>> {
    let declared = declared_log_groups(template, scope);
    let mut definitions = Vec::new();
    let mut missing_stack_name = Vec::new();

    for function in functions {
        let derived = match function_name(function, scope)? {
            FunctionName::Fixed(name) => Some(LogGroupName::Exact(format!(
                "{LAMBDA_LOG_GROUP_PREFIX}{name}"
            ))),
            FunctionName::Generated => scope
                .stack_name
                .map(|stack| LogGroupName::generated(stack, &function.key)),
            FunctionName::NeedsStackName => None,
        };

        let declaration = declared.iter().find(|(_, name)| match name {
            DeclaredName::FunctionReference(target) => *target == function.key,
            DeclaredName::Literal(literal) => derived
                .as_ref()
                .is_some_and(|d| matches!(d, LogGroupName::Exact(n) if n == literal)),
        });

        let (log_group_resource, log_group_name) = match declaration {
            Some((resource, DeclaredName::Literal(literal))) => {
                (Some(resource.clone()), LogGroupName::Exact(literal.clone()))
            }
            Some((resource, DeclaredName::FunctionReference(_))) => match derived {
                Some(name) => (Some(resource.clone()), name),
                None => {
                    missing_stack_name.push(function.key.clone());
                    continue;
                }
            },
            None => match derived {
                Some(name) => (None, name),
                None => {
                    missing_stack_name.push(function.key.clone());
                    continue;
                }
            },
        };

        definitions.push(LogGroupDefinition {
            key: function.key.clone(),
            log_group_resource,
            log_group_name,
        });
    }

    if !missing_stack_name.is_empty() {
        return Err(Error::MissingStackName {
            functions: missing_stack_name,
        });
    }
    Ok(definitions)
}
