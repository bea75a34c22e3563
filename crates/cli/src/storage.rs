// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed storage operations over the proxy.
//!
//! [`Storage`] is what the sync orchestrator depends on. [`StorageProxy`]
//! implements it by encoding each call as one proxy action.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use trawl_ipc::{
    Action, FailRunPayload, HistoryEntry, InitResult, ItemKeyPayload, ItemQuery, ItemRecord,
    ListRunsPayload, RemoteItem, RunProgressPayload, RunStarted, SyncRun, TargetPayload,
    UpsertOutcome, Watermark, WorkerStatus,
};

use crate::proxy::{ProxyError, StorageProxy};

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, ProxyError>;

/// Persistence operations used by a sync run.
///
/// `upsert_item` must be idempotent: an item whose `updated_at` is older than
/// the stored copy is ignored.
pub trait Storage: Send + Sync {
    fn init(&self) -> BoxFuture<'_, StorageResult<()>>;

    fn upsert_item<'a>(&'a self, item: &'a RemoteItem) -> BoxFuture<'a, StorageResult<UpsertOutcome>>;

    /// Newest stored `updated_at` for the target, if any items exist.
    fn latest_updated_at<'a>(
        &'a self,
        target_id: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<DateTime<Utc>>>>;

    fn count<'a>(&'a self, target_id: &'a str) -> BoxFuture<'a, StorageResult<u64>>;

    /// Open a run record and return its id.
    fn start_run<'a>(&'a self, target_id: &'a str) -> BoxFuture<'a, StorageResult<i64>>;

    fn update_run_progress(&self, run_id: i64, items_synced: u64) -> BoxFuture<'_, StorageResult<()>>;

    fn complete_run(&self, run_id: i64, items_synced: u64) -> BoxFuture<'_, StorageResult<()>>;

    fn fail_run<'a>(
        &'a self,
        run_id: i64,
        items_synced: u64,
        error: &'a str,
    ) -> BoxFuture<'a, StorageResult<()>>;

    /// Flush the engine's durable image.
    fn persist(&self) -> BoxFuture<'_, StorageResult<()>>;
}

impl StorageProxy {
    async fn request<P, R>(&self, action: Action, payload: &P) -> StorageResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload).map_err(|e| {
            ProxyError::OperationFailed(format!("invalid {} payload: {}", action, e))
        })?;
        let data = self.call(action, payload).await?;
        R::deserialize(data).map_err(|e| {
            ProxyError::OperationFailed(format!("invalid {} response: {}", action, e))
        })
    }

    async fn request_bare<R: DeserializeOwned>(&self, action: Action) -> StorageResult<R> {
        self.request(action, &serde_json::Value::Null).await
    }

    /// Open the worker's database and return its path.
    pub async fn init_database(&self) -> StorageResult<String> {
        let result: InitResult = self.request_bare(Action::Init).await?;
        Ok(result.db_path)
    }

    pub async fn get_item(&self, key: &str) -> StorageResult<ItemRecord> {
        self.request(
            Action::GetItem,
            &ItemKeyPayload {
                key: key.to_string(),
            },
        )
        .await
    }

    pub async fn search_items(&self, query: &ItemQuery) -> StorageResult<Vec<ItemRecord>> {
        self.request(Action::SearchItems, query).await
    }

    pub async fn get_history(&self, key: &str) -> StorageResult<Vec<HistoryEntry>> {
        self.request(
            Action::GetHistory,
            &ItemKeyPayload {
                key: key.to_string(),
            },
        )
        .await
    }

    pub async fn list_runs(&self, target_id: Option<&str>, limit: usize) -> StorageResult<Vec<SyncRun>> {
        self.request(
            Action::ListRuns,
            &ListRunsPayload {
                target_id: target_id.map(str::to_string),
                limit,
            },
        )
        .await
    }

    pub async fn worker_status(&self) -> StorageResult<WorkerStatus> {
        self.request_bare(Action::Status).await
    }
}

fn target(target_id: &str) -> TargetPayload {
    TargetPayload {
        target_id: target_id.to_string(),
    }
}

impl Storage for StorageProxy {
    fn init(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move { self.init_database().await.map(|_| ()) })
    }

    fn upsert_item<'a>(&'a self, item: &'a RemoteItem) -> BoxFuture<'a, StorageResult<UpsertOutcome>> {
        Box::pin(self.request(Action::UpsertItem, item))
    }

    fn latest_updated_at<'a>(
        &'a self,
        target_id: &'a str,
    ) -> BoxFuture<'a, StorageResult<Option<DateTime<Utc>>>> {
        Box::pin(async move {
            let mark: Watermark = self
                .request(Action::GetLatestUpdatedAt, &target(target_id))
                .await?;
            Ok(mark.latest_updated_at)
        })
    }

    fn count<'a>(&'a self, target_id: &'a str) -> BoxFuture<'a, StorageResult<u64>> {
        Box::pin(async move { self.request(Action::GetCount, &target(target_id)).await })
    }

    fn start_run<'a>(&'a self, target_id: &'a str) -> BoxFuture<'a, StorageResult<i64>> {
        Box::pin(async move {
            let started: RunStarted = self.request(Action::StartRun, &target(target_id)).await?;
            Ok(started.run_id)
        })
    }

    fn update_run_progress(&self, run_id: i64, items_synced: u64) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.request(
                Action::UpdateRunProgress,
                &RunProgressPayload {
                    run_id,
                    items_synced,
                },
            )
            .await
        })
    }

    fn complete_run(&self, run_id: i64, items_synced: u64) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            self.request(
                Action::CompleteRun,
                &RunProgressPayload {
                    run_id,
                    items_synced,
                },
            )
            .await
        })
    }

    fn fail_run<'a>(
        &'a self,
        run_id: i64,
        items_synced: u64,
        error: &'a str,
    ) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            self.request(
                Action::FailRun,
                &FailRunPayload {
                    run_id,
                    items_synced,
                    error: error.to_string(),
                },
            )
            .await
        })
    }

    fn persist(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(self.request_bare(Action::Persist))
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
