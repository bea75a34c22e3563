// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only views over stored items and run history.

use std::fmt::Write;

use serde::Serialize;
use trawl_core::{HistoryEntry, ItemQuery, ItemRecord, SyncRun};

use crate::cli::{ItemFilterArgs, OutputFormat};
use crate::error::Result;
use crate::proxy::StorageProxy;
use crate::storage::Storage;

use super::{format_time, print_json, Context};

#[derive(Serialize)]
struct ItemDetails {
    #[serde(flatten)]
    item: ItemRecord,
    history: Vec<HistoryEntry>,
}

/// A proxy with the worker's database opened.
async fn open_storage(ctx: &Context) -> Result<std::sync::Arc<StorageProxy>> {
    let storage = ctx.storage();
    storage.init().await?;
    Ok(storage)
}

pub(crate) fn build_query(filter: ItemFilterArgs, text: Option<String>, limit: usize) -> ItemQuery {
    ItemQuery {
        target_id: filter.target,
        text,
        status: filter.status,
        limit,
    }
}

pub async fn search(
    ctx: &Context,
    text: Option<String>,
    filter: ItemFilterArgs,
    limit: usize,
    output: OutputFormat,
) -> Result<()> {
    let storage = open_storage(ctx).await?;
    let items = storage
        .search_items(&build_query(filter, text, limit))
        .await?;

    match output {
        OutputFormat::Text if items.is_empty() => println!("No items found."),
        OutputFormat::Text => print!("{}", format_items(&items)),
        OutputFormat::Json => print_json(&items)?,
    }
    Ok(())
}

pub async fn show(ctx: &Context, key: &str, output: OutputFormat) -> Result<()> {
    let storage = open_storage(ctx).await?;
    let item = storage.get_item(key).await?;
    let history = storage.get_history(&item.id).await?;

    match output {
        OutputFormat::Text => print!("{}", format_details(&item, &history)),
        OutputFormat::Json => print_json(&ItemDetails { item, history })?,
    }
    Ok(())
}

pub async fn runs(
    ctx: &Context,
    target: Option<&str>,
    limit: usize,
    output: OutputFormat,
) -> Result<()> {
    let storage = open_storage(ctx).await?;
    let runs = storage.list_runs(target, limit).await?;

    match output {
        OutputFormat::Text if runs.is_empty() => println!("No sync runs recorded."),
        OutputFormat::Text => print!("{}", format_runs(&runs)),
        OutputFormat::Json => print_json(&runs)?,
    }
    Ok(())
}

pub(crate) fn format_items(items: &[ItemRecord]) -> String {
    let key_width = items.iter().map(|i| i.key.len()).max().unwrap_or(0);
    let status_width = items
        .iter()
        .map(|i| i.fields.status.as_deref().map_or(1, str::len))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for item in items {
        let _ = writeln!(
            out,
            "{:kw$}  {:sw$}  {}",
            item.key,
            item.fields.status.as_deref().unwrap_or("-"),
            item.fields.summary.as_deref().unwrap_or(""),
            kw = key_width,
            sw = status_width,
        );
    }
    out
}

pub(crate) fn format_details(item: &ItemRecord, history: &[HistoryEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {}",
        item.key,
        item.fields.summary.as_deref().unwrap_or("(no summary)")
    );

    let fields = [
        ("Target", Some(item.target_id.as_str())),
        ("Status", item.fields.status.as_deref()),
        ("Type", item.fields.issue_type.as_deref()),
        ("Priority", item.fields.priority.as_deref()),
        ("Assignee", item.fields.assignee.as_deref()),
        ("Reporter", item.fields.reporter.as_deref()),
        ("Resolution", item.fields.resolution.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            let _ = writeln!(out, "{}: {}", label, value);
        }
    }
    if let Some(created) = &item.fields.created_at {
        let _ = writeln!(out, "Created: {}", format_time(created));
    }
    let _ = writeln!(out, "Updated: {}", format_time(&item.updated_at));

    if !history.is_empty() {
        out.push_str("\nHistory:\n");
        for entry in history {
            let _ = writeln!(
                out,
                "  {}  {}: {} -> {}{}",
                format_time(&entry.created_at),
                entry.field,
                entry.from_value.as_deref().unwrap_or("(none)"),
                entry.to_value.as_deref().unwrap_or("(none)"),
                entry
                    .author
                    .as_deref()
                    .map(|a| format!(" ({a})"))
                    .unwrap_or_default(),
            );
        }
    }
    out
}

pub(crate) fn format_runs(runs: &[SyncRun]) -> String {
    let mut out = String::new();
    for run in runs {
        let _ = write!(
            out,
            "#{} {} {} {} items, started {}",
            run.id,
            run.target_id,
            run.status,
            run.items_synced,
            format_time(&run.started_at)
        );
        if let Some(error) = &run.error_message {
            let _ = write!(out, ": {}", error);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[path = "browse_tests.rs"]
mod tests;
