// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `trawl status`: targets, stored counts, and pending resumes.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use trawl_core::{Checkpoint, SyncTarget};

use crate::checkpoint::CheckpointStore;
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::storage::{Storage, StorageResult};

use super::{format_time, plural, print_json, Context};

/// What is known about one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TargetStatus {
    #[serde(flatten)]
    pub target: SyncTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<StoredSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Checkpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct StoredSummary {
    pub items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_updated_at: Option<DateTime<Utc>>,
}

pub async fn run(ctx: &Context, output: OutputFormat) -> Result<()> {
    let targets = ctx.targets().list()?;
    if targets.is_empty() && output == OutputFormat::Text {
        println!("No targets known.");
        println!();
        println!("Run 'trawl targets discover' to fetch them from the source.");
        return Ok(());
    }

    let storage = ctx.storage();
    let mut storage_error = storage.init().await.err().map(|e| e.to_string());
    let checkpoints = ctx.checkpoints();

    let mut rows = Vec::with_capacity(targets.len());
    for target in targets {
        let checkpoint = checkpoints.get(&target.id)?;
        let stored = if storage_error.is_none() {
            match stored_summary(storage.as_ref(), &target.id).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    storage_error = Some(e.to_string());
                    None
                }
            }
        } else {
            None
        };
        rows.push(TargetStatus {
            target,
            stored,
            checkpoint,
        });
    }

    match output {
        OutputFormat::Text => print!("{}", format_status(&rows)),
        OutputFormat::Json => print_json(&rows)?,
    }
    if let Some(e) = storage_error {
        eprintln!("warning: stored counts unavailable: {}", e);
    }
    Ok(())
}

pub(crate) async fn stored_summary(storage: &dyn Storage, target_id: &str) -> StorageResult<StoredSummary> {
    Ok(StoredSummary {
        items: storage.count(target_id).await?,
        latest_updated_at: storage.latest_updated_at(target_id).await?,
    })
}

pub(crate) fn format_status(rows: &[TargetStatus]) -> String {
    let width = rows.iter().map(|r| r.target.id.len()).max().unwrap_or(0);
    let mut out = String::new();

    for row in rows {
        let state = if row.target.enabled {
            "enabled"
        } else {
            "disabled"
        };
        let _ = write!(out, "{:width$}  {:8}", row.target.id, state);

        match &row.stored {
            Some(stored) => {
                let _ = write!(out, "  {}", plural(stored.items, "item"));
                if let Some(latest) = &stored.latest_updated_at {
                    let _ = write!(out, ", latest {}", format_time(latest));
                }
            }
            None => out.push_str("  -"),
        }

        if let Some(cp) = &row.checkpoint {
            let _ = write!(
                out,
                "  resume available at {}/{}",
                cp.start_position, cp.total_at_checkpoint
            );
            if cp.total_at_checkpoint > 0 {
                let _ = write!(out, " ({:.0}%)", cp.progress_ratio() * 100.0);
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
