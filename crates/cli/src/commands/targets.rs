// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt::Write;

use trawl_core::SyncTarget;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::source::PageSource;
use crate::targets::{MergeSummary, TargetRegistry};

use super::{plural, print_json, Context};

pub fn list(ctx: &Context, output: OutputFormat) -> Result<()> {
    let targets = ctx.targets().list()?;
    match output {
        OutputFormat::Text if targets.is_empty() => {
            println!("No targets known. Run 'trawl targets discover'.");
        }
        OutputFormat::Text => print!("{}", format_targets(&targets)),
        OutputFormat::Json => print_json(&targets)?,
    }
    Ok(())
}

pub async fn discover(ctx: &Context) -> Result<()> {
    let source = ctx.source()?;
    let summary = discover_into(&source, &ctx.targets()).await?;
    println!("{}", format_discovery(&summary));
    Ok(())
}

/// Fetch the source's target list and merge it into the registry.
pub(crate) async fn discover_into(
    source: &dyn PageSource,
    registry: &TargetRegistry,
) -> Result<MergeSummary> {
    let discovered = source.list_targets().await?;
    tracing::info!(count = discovered.len(), "targets discovered");
    registry.merge_discovered(&discovered)
}

pub fn set_enabled(ctx: &Context, ids: &[String], enabled: bool) -> Result<()> {
    let registry = ctx.targets();
    for id in ids {
        registry.set_enabled(id, enabled)?;
        println!("{} {}", if enabled { "Enabled" } else { "Disabled" }, id);
    }
    Ok(())
}

pub(crate) fn format_targets(targets: &[SyncTarget]) -> String {
    let width = targets.iter().map(|t| t.id.len()).max().unwrap_or(0);
    let mut out = String::new();
    for target in targets {
        let marker = if target.enabled { "*" } else { " " };
        let _ = match &target.name {
            Some(name) => writeln!(out, "{} {:width$}  {}", marker, target.id, name),
            None => writeln!(out, "{} {}", marker, target.id),
        };
    }
    out
}

pub(crate) fn format_discovery(summary: &MergeSummary) -> String {
    let mut out = format!(
        "Discovered {} ({} new).",
        plural(summary.total as u64, "target"),
        summary.added.len()
    );
    if !summary.added.is_empty() {
        let _ = write!(
            out,
            "\nNew (disabled): {}\nEnable with 'trawl targets enable <ID>'.",
            summary.added.join(", ")
        );
    }
    out
}

#[cfg(test)]
#[path = "targets_tests.rs"]
mod tests;
