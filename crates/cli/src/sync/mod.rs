// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental, resumable sync of tracker targets into local storage.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  pages   ┌──────────────────┐  upserts  ┌──────────────┐
//! │  PageSource  │─────────►│ SyncOrchestrator │──────────►│   Storage    │
//! │ (BatchIter.) │          │  (state machine) │           │ (proxy RPC)  │
//! └──────────────┘          └──────────────────┘           └──────────────┘
//!                                 │       │
//!                                 ▼       ▼
//!                      ┌─────────────┐ ┌───────────────────┐
//!                      │ Checkpoints │ │ ProgressPublisher │
//!                      └─────────────┘ └───────────────────┘
//! ```
//!
//! One sweep runs at a time across all targets. Within a target, batches are
//! applied in source order and a checkpoint is written after each one, so an
//! interrupted run resumes at the last fully applied batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trawl_core::Checkpoint;

use crate::checkpoint::CheckpointStore;
use crate::error::{Error, Result};
use crate::source::{BatchIterator, PageSource};
use crate::storage::Storage;
use crate::targets::TargetRegistry;

mod progress;

pub use progress::{ProgressEvent, ProgressPublisher, SyncStatus, ITEMS_PHASE};

/// Knobs for a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Use the stored watermark as a lower bound when no checkpoint exists.
    pub incremental: bool,
    /// Subtracted from the watermark to catch late or skewed updates.
    pub safety_margin: chrono::Duration,
    pub page_size: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            incremental: true,
            safety_margin: chrono::Duration::seconds(300),
            page_size: 50,
        }
    }
}

impl From<&crate::config::Config> for SyncOptions {
    fn from(config: &crate::config::Config) -> Self {
        SyncOptions {
            incremental: config.sync.incremental,
            safety_margin: config.sync.safety_margin(),
            page_size: config.source.page_size,
        }
    }
}

/// How one target's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed { items: u64 },
    Cancelled { items: u64 },
    Failed { items: u64, error: String },
}

impl SyncOutcome {
    pub fn items(&self) -> u64 {
        match self {
            SyncOutcome::Completed { items }
            | SyncOutcome::Cancelled { items }
            | SyncOutcome::Failed { items, .. } => *items,
        }
    }
}

/// Per-target results of a sweep, in the order targets were visited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: Vec<(String, SyncOutcome)>,
    /// Targets never started because the sweep was cancelled first.
    pub skipped: Vec<String>,
}

impl SyncReport {
    pub fn outcome(&self, target_id: &str) -> Option<&SyncOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == target_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SyncOutcome::Failed { .. }))
            .count()
    }

    pub fn was_cancelled(&self) -> bool {
        !self.skipped.is_empty()
            || self
                .outcomes
                .iter()
                .any(|(_, o)| matches!(o, SyncOutcome::Cancelled { .. }))
    }
}

/// A sweep started in the background.
pub struct SyncHandle {
    pub started: bool,
    join: JoinHandle<Result<SyncReport>>,
}

impl SyncHandle {
    /// Wait for the sweep to finish.
    pub async fn wait(self) -> Result<SyncReport> {
        self.join
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("sync task failed: {}", e))))?
    }
}

/// Per-run bookkeeping needed to close the run record on failure.
#[derive(Default)]
struct RunState {
    run_id: Option<i64>,
    items: u64,
}

/// Drives sync runs. Share it behind an `Arc`.
pub struct SyncOrchestrator {
    source: Arc<dyn PageSource>,
    storage: Arc<dyn Storage>,
    checkpoints: Arc<dyn CheckpointStore>,
    targets: TargetRegistry,
    options: SyncOptions,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
    progress: Mutex<Option<ProgressEvent>>,
    publisher: ProgressPublisher,
}

/// Holds the global sync lock for one sweep.
struct SweepGuard {
    orchestrator: Arc<SyncOrchestrator>,
    token: CancellationToken,
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        *lock(&self.orchestrator.progress) = None;
        self.orchestrator.running.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn PageSource>,
        storage: Arc<dyn Storage>,
        checkpoints: Arc<dyn CheckpointStore>,
        targets: TargetRegistry,
        options: SyncOptions,
    ) -> Self {
        SyncOrchestrator {
            source,
            storage,
            checkpoints,
            targets,
            options,
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            progress: Mutex::new(None),
            publisher: ProgressPublisher::new(),
        }
    }

    /// Receive progress events. Delivery is best-effort.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ProgressEvent> {
        self.publisher.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            is_syncing: self.running.load(Ordering::SeqCst),
            progress: lock(&self.progress).clone(),
        }
    }

    /// Request a stop at the next batch boundary. No-op when idle.
    pub fn cancel_sync(&self) {
        let token = lock(&self.cancel);
        if self.running.load(Ordering::SeqCst) {
            tracing::info!("cancellation requested");
            token.cancel();
        }
    }

    /// Start a sweep of all enabled targets in the background.
    ///
    /// Fails with [`Error::AlreadyRunning`] if a sweep holds the lock.
    pub fn start_sync(self: &Arc<Self>) -> Result<SyncHandle> {
        let guard = self.acquire()?;
        let this = Arc::clone(self);
        let join = tokio::spawn(async move {
            let ids = this.enabled_target_ids()?;
            Ok(this.sweep(&guard, &ids, false).await)
        });
        Ok(SyncHandle {
            started: true,
            join,
        })
    }

    /// Sync every enabled target, in registry order.
    pub async fn sync_all(self: &Arc<Self>) -> Result<SyncReport> {
        let guard = self.acquire()?;
        let ids = self.enabled_target_ids()?;
        Ok(self.sweep(&guard, &ids, false).await)
    }

    /// Sync the named targets, enabled or not. `full` discards checkpoints
    /// and ignores the incremental watermark.
    pub async fn sync_targets(self: &Arc<Self>, ids: &[String], full: bool) -> Result<SyncReport> {
        let guard = self.acquire()?;
        for id in ids {
            if self.targets.find(id)?.is_none() {
                return Err(Error::TargetNotFound(id.clone()));
            }
        }
        Ok(self.sweep(&guard, ids, full).await)
    }

    fn acquire(self: &Arc<Self>) -> Result<SweepGuard> {
        // The fresh token is installed under the same lock `cancel_sync` takes,
        // so a cancel can never land on the previous sweep's token.
        let mut current = lock(&self.cancel);
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }
        let token = CancellationToken::new();
        *current = token.clone();
        drop(current);
        Ok(SweepGuard {
            orchestrator: Arc::clone(self),
            token,
        })
    }

    fn enabled_target_ids(&self) -> Result<Vec<String>> {
        Ok(self.targets.enabled()?.into_iter().map(|t| t.id).collect())
    }

    async fn sweep(&self, guard: &SweepGuard, ids: &[String], full: bool) -> SyncReport {
        let mut report = SyncReport::default();

        for (index, target_id) in ids.iter().enumerate() {
            if guard.token.is_cancelled() {
                report.skipped = ids[index..].to_vec();
                break;
            }
            let outcome = self.sync_target(target_id, full, &guard.token).await;
            report.outcomes.push((target_id.clone(), outcome));
        }

        tracing::info!(
            targets = report.outcomes.len(),
            failures = report.failures(),
            skipped = report.skipped.len(),
            "sync sweep finished"
        );
        report
    }

    async fn sync_target(&self, target_id: &str, full: bool, token: &CancellationToken) -> SyncOutcome {
        let mut run = RunState::default();

        match self.run_target(target_id, full, token, &mut run).await {
            Ok(()) => {
                tracing::info!(target_id, items = run.items, "sync completed");
                SyncOutcome::Completed { items: run.items }
            }
            Err(Error::Cancelled) => {
                tracing::info!(target_id, items = run.items, "sync cancelled");
                self.close_run(&run, "cancelled").await;
                SyncOutcome::Cancelled { items: run.items }
            }
            Err(e) => {
                let error = e.to_string();
                tracing::error!(target_id, items = run.items, "sync failed: {}", error);
                self.close_run(&run, &error).await;
                SyncOutcome::Failed {
                    items: run.items,
                    error,
                }
            }
        }
    }

    /// Mark an unfinished run as failed in the audit log.
    async fn close_run(&self, run: &RunState, message: &str) {
        let Some(run_id) = run.run_id else {
            return;
        };
        if let Err(e) = self.storage.fail_run(run_id, run.items, message).await {
            tracing::warn!(run_id, "failed to record run failure: {}", e);
        }
    }

    async fn run_target(
        &self,
        target_id: &str,
        full: bool,
        token: &CancellationToken,
        run: &mut RunState,
    ) -> Result<()> {
        // Worker readiness comes first; nothing is written before it succeeds.
        self.storage.init().await?;

        if full {
            self.checkpoints.clear(target_id)?;
        }
        let checkpoint = self.checkpoints.get(target_id)?;

        let (updated_since, start_position) = match &checkpoint {
            Some(cp) => {
                tracing::info!(
                    target_id,
                    position = cp.start_position,
                    total = cp.total_at_checkpoint,
                    "resuming from checkpoint"
                );
                (cp.updated_since, cp.start_position)
            }
            None if self.options.incremental && !full => {
                let watermark = self.storage.latest_updated_at(target_id).await?;
                // A bound that underflows the calendar means "from the beginning".
                let since =
                    watermark.and_then(|w| w.checked_sub_signed(self.options.safety_margin));
                (since, 0)
            }
            None => (None, 0),
        };

        let run_id = self.storage.start_run(target_id).await?;
        run.run_id = Some(run_id);
        tracing::info!(target_id, run_id, ?updated_since, start_position, "sync started");

        self.report(ProgressEvent::items(
            target_id,
            start_position,
            checkpoint.as_ref().map_or(0, |cp| cp.total_at_checkpoint),
        ));

        let log_target = target_id.to_string();
        let mut pages = BatchIterator::new(
            self.source.as_ref(),
            target_id,
            updated_since,
            self.options.page_size,
        )
        .starting_at(start_position)
        .with_progress(Box::new(move |seen, total| {
            tracing::debug!(target_id = %log_target, seen, total, "page fetched");
        }));

        let mut last_applied: Option<Checkpoint> = None;

        loop {
            if token.is_cancelled() {
                // Re-assert the last fully applied batch so the stored position
                // is never ahead of what storage holds.
                if let Some(cp) = &last_applied {
                    if let Err(e) = self.checkpoints.put(target_id, cp) {
                        tracing::warn!(target_id, "failed to save checkpoint on cancel: {}", e);
                    }
                }
                return Err(Error::Cancelled);
            }

            let Some(batch) = pages.next_batch().await? else {
                break;
            };

            for item in &batch {
                self.storage.upsert_item(item).await?;
                run.items += 1;
            }

            if let Some(last) = batch.last() {
                let cp = Checkpoint {
                    last_processed_updated_at: last.updated_at,
                    start_position: pages.position(),
                    total_at_checkpoint: pages.total(),
                    updated_since,
                };
                self.checkpoints.put(target_id, &cp)?;
                last_applied = Some(cp);
            }

            self.storage.update_run_progress(run_id, run.items).await?;
            self.report(ProgressEvent::items(target_id, pages.position(), pages.total()));
        }

        self.checkpoints.clear(target_id)?;
        self.storage.complete_run(run_id, run.items).await?;
        self.storage.persist().await?;
        Ok(())
    }

    fn report(&self, event: ProgressEvent) {
        *lock(&self.progress) = Some(event.clone());
        self.publisher.publish(event);
    }
}

#[cfg(test)]
pub(crate) mod test_helpers;
