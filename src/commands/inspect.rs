//! `stackweave inspect` - show what the macro sees in a template

use anyhow::{Result, bail};
use colored::Colorize;
use serde_json::{Map, Value};
use transform::forwarder::{LogGroupDefinition, resolve_log_groups};
use transform::intrinsics::Scope;
use transform::{Error, Template};

use super::read_json;
use crate::Context;
use crate::cli::InspectArgs;
use crate::ui;

pub fn run(ctx: &Context, args: InspectArgs) -> Result<()> {
    let mut document = read_json(&args.template)?;
    let mut parameters = Map::new();

    // Accept an invocation envelope as well as a bare template.
    if let Some(envelope) = document.as_object_mut() {
        if envelope.contains_key("fragment") && !envelope.contains_key("Resources") {
            if let Some(Value::Object(values)) = envelope.remove("templateParameterValues") {
                parameters = values;
            }
            document = envelope.remove("fragment").unwrap_or_default();
        }
    }

    let template = Template::from_fragment(document)?;
    let functions = template.functions();

    ui::header(&format!("Functions ({})", functions.len()));
    for function in &functions {
        let runtime = match function.runtime {
            Some(runtime) => format!(
                "{} {} ({})",
                function.runtime_type, function.runtime_version, runtime
            ),
            None if function.runtime_version.is_empty() => "no runtime".dimmed().to_string(),
            None => format!("{} (not instrumented)", function.runtime_version)
                .dimmed()
                .to_string(),
        };
        eprintln!("  {} {}", function.key.bold(), runtime);
        if ctx.verbose > 0 {
            if let Some(role) = &function.role_key {
                ui::kv("role", role);
            }
            if let Some(runtime) = function.runtime {
                ui::kv("layer", runtime.layer_name());
            }
        }
    }

    let scope = Scope {
        region: &args.region,
        account_id: &args.account_id,
        stack_name: args.stack_name.as_deref(),
        parameters: &parameters,
        resources: template.resources(),
    };

    ui::header("Log groups");
    match resolve_log_groups(&template, &functions, &scope) {
        Ok(definitions) => {
            for definition in &definitions {
                print_definition(definition);
            }
        }
        Err(Error::MissingStackName { functions }) => {
            ui::warn(&format!(
                "pass --stack-name to resolve generated log group names for: {}",
                functions.join(", ")
            ));
        }
        Err(e) => bail!(e),
    }

    Ok(())
}

fn print_definition(definition: &LogGroupDefinition) {
    let source = match &definition.log_group_resource {
        Some(resource) => format!("declared by {resource}"),
        None if definition.log_group_name.is_exact() => "derived".to_string(),
        None => "generated name".to_string(),
    };
    eprintln!(
        "  {} {} {}",
        definition.key.bold(),
        definition.log_group_name.to_string().cyan(),
        format!("({source})").dimmed()
    );
}
