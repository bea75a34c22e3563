// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! `trawl sync`: run a sweep in the foreground.
//!
//! Progress goes to stderr; Ctrl-C requests cancellation at the next page
//! boundary so the checkpoint stays consistent.

use std::fmt::Write;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use crate::error::{Error, Result};
use crate::sync::{SyncOrchestrator, SyncOutcome, SyncReport};

use super::{plural, Context};

pub async fn run(ctx: &Context, targets: Vec<String>, full: bool) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let ids = if targets.is_empty() {
        let enabled: Vec<String> = ctx.targets().enabled()?.into_iter().map(|t| t.id).collect();
        if enabled.is_empty() {
            println!("No enabled targets.");
            println!();
            println!("Run 'trawl targets discover', then 'trawl targets enable <ID>'.");
            return Ok(());
        }
        enabled
    } else {
        targets
    };

    let printer = spawn_progress_printer(&orchestrator);
    let interrupt = spawn_interrupt_handler(&orchestrator);

    let result = orchestrator.sync_targets(&ids, full).await;

    interrupt.abort();
    printer.abort();

    let report = result?;
    print!("{}", format_report(&report));
    check_report(&report)
}

fn spawn_progress_printer(orchestrator: &Arc<SyncOrchestrator>) -> tokio::task::JoinHandle<()> {
    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => eprintln!("{}", event.message),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn spawn_interrupt_handler(orchestrator: &Arc<SyncOrchestrator>) -> tokio::task::JoinHandle<()> {
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, &orchestrator).await {
            eprintln!("Aborted.");
            std::process::exit(130);
        }
    })
}

/// Cancel on the first signal. Returns `true` once a second signal asks to
/// abort outright, or `false` if the signal listener goes away.
pub(crate) async fn watch_interrupts<F, Fut>(
    mut next_signal: F,
    orchestrator: &SyncOrchestrator,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let mut cancelled = false;
    while next_signal().await.is_ok() {
        if cancelled {
            return true;
        }
        eprintln!("Cancelling after the current page... (Ctrl-C again to abort)");
        orchestrator.cancel_sync();
        cancelled = true;
    }
    false
}

/// One line per target.
pub(crate) fn format_report(report: &SyncReport) -> String {
    let mut out = String::new();
    for (target_id, outcome) in &report.outcomes {
        let _ = match outcome {
            SyncOutcome::Completed { items } => {
                writeln!(out, "{}: synced {}", target_id, plural(*items, "item"))
            }
            SyncOutcome::Cancelled { items } => writeln!(
                out,
                "{}: cancelled after {} (run 'trawl sync' to resume)",
                target_id,
                plural(*items, "item")
            ),
            SyncOutcome::Failed { items, error } => writeln!(
                out,
                "{}: failed after {}: {}",
                target_id,
                plural(*items, "item"),
                error
            ),
        };
    }
    for target_id in &report.skipped {
        let _ = writeln!(out, "{}: skipped", target_id);
    }
    out
}

/// Failures take precedence over cancellation for the exit status.
pub(crate) fn check_report(report: &SyncReport) -> Result<()> {
    match report.failures() {
        0 if report.was_cancelled() => Err(Error::Cancelled),
        0 => Ok(()),
        failed => Err(Error::SyncFailed(failed)),
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
