//! `stackweave transform` - run the macro on an invocation envelope

use anyhow::{Context as _, Result, bail};
use logkit::{Client, SdkSettings};
use serde_json::Value;
use transform::forwarder::{ApplyResult, ReconcileReport, ReconcileSummary, UnitReport};
use transform::template::OPTIONS_MAPPING;
use transform::{MacroRequest, MacroResponse, TransformOptions, Transformer};

use super::read_request;
use crate::Context;
use crate::cli::TransformArgs;
use crate::config::StackweaveConfig;
use crate::ui;

pub fn run(ctx: &Context, args: TransformArgs) -> Result<()> {
    let config = StackweaveConfig::load()?;
    let request = read_request(&args.event)?;

    let options = TransformOptions {
        jobs: args.jobs.or(config.jobs).unwrap_or(4).max(1),
        dry_run: args.dry_run,
        reconcile: true,
    };

    let client = if wants_forwarding(&request) {
        let profile = args.profile.or_else(|| config.aws_profile.clone());
        match build_client(&config, &request.region, profile) {
            Ok(client) => Some(client),
            Err(e) => {
                // The engine reports the missing client in the response.
                log::warn!("logging service unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let mut transformer = Transformer::new(options);
    if let Some(client) = &client {
        transformer = transformer.with_client(client);
    }

    let request_id = request.request_id.clone();
    let result = transformer.run(request);
    if !ctx.quiet
        && let Ok(outcome) = &result
        && let Some(report) = &outcome.report
    {
        print_report(report);
    }
    let response = MacroResponse::from_result(request_id, result);
    let json = serde_json::to_string_pretty(&response).context("Failed to serialize response")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Could not write {}", path.display()))?;
            if !ctx.quiet {
                ui::info(&format!("Response written to {}", path.display()));
            }
        }
        None => println!("{json}"),
    }

    if !response.is_success() {
        bail!(
            "transformation failed: {}",
            response.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    if !ctx.quiet && args.output.is_some() {
        ui::success("Transformation succeeded");
    }
    Ok(())
}

/// Whether the request configures a forwarder (params or template mapping).
fn wants_forwarding(request: &MacroRequest) -> bool {
    let set = |v: &Value| !v.is_null() && v.as_str() != Some("");
    request.params.get("forwarderArn").is_some_and(set)
        || request
            .fragment
            .pointer(&format!("/Mappings/{OPTIONS_MAPPING}/Parameters/forwarderArn"))
            .is_some_and(set)
}

fn build_client(
    config: &StackweaveConfig,
    region: &str,
    profile: Option<String>,
) -> Result<Client> {
    let settings = SdkSettings {
        region: Some(region.to_string()),
        profile,
        read_timeout: config.read_timeout(),
    };
    let retry = config.retry_config()?;
    log::debug!("connecting to CloudWatch Logs in {region}");
    Ok(Client::connect(&settings)?.with_retry(retry))
}

/// Per log group outcome on stderr; stdout carries the response.
fn print_report(report: &ReconcileReport) {
    ui::header(if report.dry_run {
        "Log forwarding (dry run)"
    } else {
        "Log forwarding"
    });
    for unit in &report.units {
        let line = unit_line(unit);
        if !unit.result.is_success() {
            ui::error(&line);
        } else if unit.result.is_change() {
            ui::success(&line);
        } else {
            ui::dim(&line);
        }
    }
    let summary = summary_line(&report.summary);
    if report.summary.is_success() {
        ui::info(&summary);
    } else {
        ui::warn(&summary);
    }
}

fn unit_line(unit: &UnitReport) -> String {
    let outcome = match &unit.result {
        ApplyResult::NoChange => "already subscribed".to_string(),
        ApplyResult::Created => "created and subscribed".to_string(),
        ApplyResult::Modified => "subscribed".to_string(),
        ApplyResult::Skipped { reason } => format!("skipped: {reason}"),
        ApplyResult::Failed { error } => format!("failed: {error}"),
    };
    format!("{} ({}): {outcome}", unit.keys.join(", "), unit.log_group)
}

fn summary_line(summary: &ReconcileSummary) -> String {
    format!(
        "{} of {} log group(s) changed, {} unchanged, {} skipped, {} failed",
        summary.total_changes(),
        summary.total(),
        summary.no_change,
        summary.skipped,
        summary.failed
    )
}
