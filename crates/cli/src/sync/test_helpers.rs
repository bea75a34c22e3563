// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures_util::future::BoxFuture;
use serde_json::json;
use tempfile::TempDir;
use trawl_core::{RemoteItem, Store, SyncTarget, UpsertOutcome};

use super::{SyncOptions, SyncOrchestrator};
use crate::checkpoint::SettingsCheckpoints;
use crate::proxy::ProxyError;
use crate::settings::Settings;
use crate::source::{Page, PageRequest, PageSource, SourceError, SourceResult};
use crate::storage::{Storage, StorageResult};
use crate::targets::TargetRegistry;

/// Base instant for test timestamps.
pub fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// An item of `target` updated at `t(minute)`, with one changelog entry.
pub fn item(target: &str, n: u32, minute: i64) -> RemoteItem {
    let updated = t(minute);
    RemoteItem::new(
        format!("{target}-{n}"),
        format!("{target}-{n}"),
        target,
        updated,
        json!({
            "id": format!("{target}-{n}"),
            "key": format!("{target}-{n}"),
            "fields": { "summary": format!("item {n} v{minute}") },
            "changelog": { "histories": [{
                "id": format!("h{n}"),
                "created": updated.to_rfc3339(),
                "items": [{ "field": "status", "fromString": "Open", "toString": "Done" }]
            }]}
        }),
    )
}

type Hook = Box<dyn Fn(u64) + Send + Sync>;

/// Storage backed by an in-memory [`Store`].
pub struct MemoryStorage {
    pub store: Mutex<Store>,
    pub init_error: Mutex<Option<ProxyError>>,
    /// Called with the run's item count on every progress update.
    pub on_progress: Mutex<Option<Hook>>,
    /// One-shot failure when upserting the item with this key.
    pub fail_upsert: Mutex<Option<(String, ProxyError)>>,
    /// One-shot failure of the next progress update.
    pub fail_progress: Mutex<Option<ProxyError>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStorage {
            store: Mutex::new(Store::open_in_memory().unwrap()),
            init_error: Mutex::new(None),
            on_progress: Mutex::new(None),
            fail_upsert: Mutex::new(None),
            fail_progress: Mutex::new(None),
        })
    }

    pub fn count_now(&self, target: &str) -> u64 {
        self.store.lock().unwrap().count(target).unwrap()
    }

    pub fn history_len(&self, key: &str) -> usize {
        self.store.lock().unwrap().get_history(key).unwrap().len()
    }

    pub fn summary(&self, key: &str) -> Option<String> {
        self.store
            .lock()
            .unwrap()
            .get_item(key)
            .unwrap()
            .fields
            .summary
    }
}

fn op_err(e: trawl_core::Error) -> ProxyError {
    ProxyError::OperationFailed(e.to_string())
}

impl Storage for MemoryStorage {
    fn init(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            match self.init_error.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }

    fn upsert_item<'a>(&'a self, item: &'a RemoteItem) -> BoxFuture<'a, StorageResult<UpsertOutcome>> {
        Box::pin(async move {
            let mut fail = self.fail_upsert.lock().unwrap();
            if fail.as_ref().is_some_and(|(key, _)| *key == item.key) {
                return Err(fail.take().unwrap().1);
            }
            drop(fail);
            self.store.lock().unwrap().upsert_item(item).map_err(op_err)
        })
    }

    fn latest_updated_at<'a>(
        &'a self,
        target_id: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<DateTime<Utc>>>> {
        Box::pin(async move { self.store.lock().unwrap().latest_updated_at(target_id).map_err(op_err) })
    }

    fn count<'a>(&'a self, target_id: &'a str) -> BoxFuture<'a, StorageResult<u64>> {
        Box::pin(async move { self.store.lock().unwrap().count(target_id).map_err(op_err) })
    }

    fn start_run<'a>(&'a self, target_id: &'a str) -> BoxFuture<'a, StorageResult<i64>> {
        Box::pin(async move { self.store.lock().unwrap().start_run(target_id).map_err(op_err) })
    }

    fn update_run_progress(&self, run_id: i64, items_synced: u64) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            if let Some(e) = self.fail_progress.lock().unwrap().take() {
                return Err(e);
            }
            self.store
                .lock()
                .unwrap()
                .update_run_progress(run_id, items_synced)
                .map_err(op_err)?;
            if let Some(hook) = self.on_progress.lock().unwrap().as_ref() {
                hook(items_synced);
            }
            Ok(())
        })
    }

    fn complete_run(&self, run_id: i64, items_synced: u64) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.store
                .lock()
                .unwrap()
                .complete_run(run_id, items_synced)
                .map_err(op_err)
        })
    }

    fn fail_run<'a>(
        &'a self,
        run_id: i64,
        items_synced: u64,
        error: &'a str,
    ) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            self.store
                .lock()
                .unwrap()
                .fail_run(run_id, items_synced, error)
                .map_err(op_err)
        })
    }

    fn persist(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move { self.store.lock().unwrap().persist().map_err(op_err) })
    }
}

/// Serves per-target item lists the way the tracker does: filtered by
/// `updated >= since`, ordered, paged by offset.
#[derive(Default)]
pub struct ScriptedSource {
    pub items: Mutex<HashMap<String, Vec<RemoteItem>>>,
    pub requests: Mutex<Vec<PageRequest>>,
    /// One-shot failure for `(target, offset)`.
    pub fail_at: Mutex<Option<(String, u64)>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(ScriptedSource::default())
    }

    pub fn set(&self, target: &str, items: Vec<RemoteItem>) {
        self.items.lock().unwrap().insert(target.to_string(), items);
    }

    pub fn requests_for(&self, target: &str) -> Vec<PageRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.target_id == target)
            .cloned()
            .collect()
    }
}

impl PageSource for ScriptedSource {
    fn fetch_page(&self, request: PageRequest) -> BoxFuture<'_, SourceResult<Page>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            tokio::task::yield_now().await;

            let mut fail_at = self.fail_at.lock().unwrap();
            if fail_at.as_ref() == Some(&(request.target_id.clone(), request.offset)) {
                *fail_at = None;
                return Err(SourceError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                });
            }
            drop(fail_at);

            let mut matching: Vec<RemoteItem> = self
                .items
                .lock()
                .unwrap()
                .get(&request.target_id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|i| match request.updated_since {
                    Some(since) => i.updated_at >= since,
                    None => true,
                })
                .collect();
            matching.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.key.cmp(&b.key)));

            let total = matching.len() as u64;
            let items = matching
                .into_iter()
                .skip(request.offset as usize)
                .take(request.page_size as usize)
                .collect();
            Ok(Page { items, total })
        })
    }

    fn list_targets(&self) -> BoxFuture<'_, SourceResult<Vec<SyncTarget>>> {
        Box::pin(async move {
            let mut ids: Vec<String> = self.items.lock().unwrap().keys().cloned().collect();
            ids.sort();
            Ok(ids
                .into_iter()
                .map(|id| SyncTarget::discovered(id, None))
                .collect())
        })
    }
}

/// Everything a sync test needs, wired together.
pub struct Harness {
    dir: TempDir,
    pub source: Arc<ScriptedSource>,
    pub storage: Arc<MemoryStorage>,
    pub checkpoints: SettingsCheckpoints,
    pub targets: TargetRegistry,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl Harness {
    /// Harness with the given targets registered and enabled.
    pub fn new(enabled: &[&str], options: SyncOptions) -> Self {
        let dir = TempDir::new().unwrap();
        let settings = Arc::new(Settings::in_state_dir(dir.path()));
        let checkpoints = SettingsCheckpoints::new(Arc::clone(&settings));
        let targets = TargetRegistry::new(Arc::clone(&settings));

        let discovered: Vec<SyncTarget> = enabled
            .iter()
            .map(|id| SyncTarget::discovered(*id, None))
            .collect();
        targets.merge_discovered(&discovered).unwrap();
        for id in enabled {
            targets.set_enabled(id, true).unwrap();
        }

        let source = ScriptedSource::new();
        let storage = MemoryStorage::new();
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::clone(&source) as Arc<dyn PageSource>,
            Arc::clone(&storage) as Arc<dyn Storage>,
            Arc::new(checkpoints.clone()),
            targets.clone(),
            options,
        ));

        Harness {
            dir,
            source,
            storage,
            checkpoints,
            targets,
            orchestrator,
        }
    }

    pub fn state_dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Cancel the running sweep once a run has applied `after_items` items.
    pub fn cancel_after(&self, after_items: u64) {
        let weak = Arc::downgrade(&self.orchestrator);
        *self.storage.on_progress.lock().unwrap() = Some(Box::new(move |items| {
            if items >= after_items {
                if let Some(orchestrator) = weak.upgrade() {
                    orchestrator.cancel_sync();
                }
            }
        }));
    }
}

pub fn options(page_size: u32) -> SyncOptions {
    SyncOptions {
        page_size,
        ..SyncOptions::default()
    }
}
