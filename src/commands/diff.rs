//! `stackweave diff` - preview the template mutations
//!
//! Runs the static part of the macro (layers, tracing, tags, environment)
//! without contacting the logging service, and prints a line diff of the
//! fragment.

use anyhow::{Context as _, Result};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use transform::{TransformOptions, Transformer};

use super::read_request;
use crate::Context;
use crate::cli::DiffArgs;
use crate::ui;

pub fn run(ctx: &Context, args: DiffArgs) -> Result<()> {
    let request = read_request(&args.event)?;
    let before = serde_json::to_string_pretty(&request.fragment)?;

    let options = TransformOptions {
        reconcile: false,
        ..TransformOptions::default()
    };
    let outcome = Transformer::new(options)
        .run(request)
        .context("transformation failed")?;
    let after = serde_json::to_string_pretty(&outcome.fragment)?;

    let changes = changed_lines(&before, &after);
    if changes.is_empty() {
        if !ctx.quiet {
            ui::success("No changes");
        }
        return Ok(());
    }

    for (tag, line) in &changes {
        match tag {
            ChangeTag::Delete => println!("{}", format!("- {line}").red()),
            ChangeTag::Insert => println!("{}", format!("+ {line}").green()),
            ChangeTag::Equal => {}
        }
    }

    if !ctx.quiet {
        let inserted = changes.iter().filter(|(t, _)| *t == ChangeTag::Insert).count();
        let deleted = changes.len() - inserted;
        ui::dim(&format!("{inserted} line(s) added, {deleted} removed"));
        if outcome.params.forwarder_arn.is_some() {
            ui::info("log forwarding is not part of the diff; run `stackweave transform --dry-run`");
        }
    }
    Ok(())
}

/// Inserted and deleted lines between two texts.
fn changed_lines(before: &str, after: &str) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(before, after)
        .iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| (change.tag(), change.value().trim_end().to_string()))
        .collect()
}
