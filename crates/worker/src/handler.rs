// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatch for the storage worker.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use trawl_core::Store;
use trawl_ipc::{
    Action, FailRunPayload, InitResult, ItemKeyPayload, ItemQuery, ListRunsPayload,
    ProxyRequest, ProxyResponse, RemoteItem, RunProgressPayload, RunStarted, TargetPayload,
    Watermark, WorkerStatus, PING_SENTINEL, STORAGE_TARGET,
};

/// Owns the storage engine and answers proxy requests one at a time.
pub struct Handler {
    db_path: PathBuf,
    store: Option<Store>,
    started: Instant,
}

impl Handler {
    /// Create a handler for the database at `db_path`. The database is not
    /// opened until `INIT` or the first storage action.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Handler {
            db_path: db_path.into(),
            store: None,
            started: Instant::now(),
        }
    }

    /// Path of the database this handler serves.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Whether the database has been opened.
    pub fn is_initialized(&self) -> bool {
        self.store.is_some()
    }

    /// Answer one request. Every request yields exactly one response.
    pub fn handle(&mut self, request: &ProxyRequest) -> ProxyResponse {
        if request.target != STORAGE_TARGET {
            return ProxyResponse::err(
                request.request_id,
                format!("unknown target: '{}'", request.target),
            );
        }

        let action = match request.action() {
            Ok(action) => action,
            Err(e) => return ProxyResponse::err(request.request_id, e.to_string()),
        };

        tracing::debug!(action = %action, request_id = request.request_id, "handling request");

        match self.dispatch(action, request) {
            Ok(data) => ProxyResponse::ok(request.request_id, data),
            Err(message) => {
                tracing::warn!(action = %action, "request failed: {}", message);
                ProxyResponse::err(request.request_id, message)
            }
        }
    }

    /// Flush the database if it is open.
    pub fn flush(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.persist() {
                tracing::warn!("failed to persist on shutdown: {}", e);
            }
        }
    }

    fn dispatch(&mut self, action: Action, request: &ProxyRequest) -> Result<Value, String> {
        match action {
            Action::Ping => Ok(Value::String(PING_SENTINEL.to_string())),
            Action::Status => to_data(WorkerStatus::new(
                std::process::id(),
                self.started.elapsed().as_secs(),
                self.is_initialized(),
            )),
            Action::Shutdown => {
                self.flush();
                Ok(Value::Null)
            }
            Action::Init => {
                self.store()?;
                to_data(InitResult {
                    db_path: self.db_path.display().to_string(),
                })
            }
            Action::UpsertItem => {
                let item: RemoteItem = decode(action, request)?;
                let outcome = self.store()?.upsert_item(&item).map_err(|e| e.to_string())?;
                to_data(outcome)
            }
            Action::GetLatestUpdatedAt => {
                let payload: TargetPayload = decode(action, request)?;
                let latest = self
                    .store()?
                    .latest_updated_at(&payload.target_id)
                    .map_err(|e| e.to_string())?;
                to_data(Watermark {
                    latest_updated_at: latest,
                })
            }
            Action::GetCount => {
                let payload: TargetPayload = decode(action, request)?;
                let count = self
                    .store()?
                    .count(&payload.target_id)
                    .map_err(|e| e.to_string())?;
                to_data(count)
            }
            Action::StartRun => {
                let payload: TargetPayload = decode(action, request)?;
                let run_id = self
                    .store()?
                    .start_run(&payload.target_id)
                    .map_err(|e| e.to_string())?;
                to_data(RunStarted { run_id })
            }
            Action::UpdateRunProgress => {
                let payload: RunProgressPayload = decode(action, request)?;
                self.store()?
                    .update_run_progress(payload.run_id, payload.items_synced)
                    .map_err(|e| e.to_string())?;
                Ok(Value::Null)
            }
            Action::CompleteRun => {
                let payload: RunProgressPayload = decode(action, request)?;
                self.store()?
                    .complete_run(payload.run_id, payload.items_synced)
                    .map_err(|e| e.to_string())?;
                Ok(Value::Null)
            }
            Action::FailRun => {
                let payload: FailRunPayload = decode(action, request)?;
                self.store()?
                    .fail_run(payload.run_id, payload.items_synced, &payload.error)
                    .map_err(|e| e.to_string())?;
                Ok(Value::Null)
            }
            Action::Persist => {
                self.store()?.persist().map_err(|e| e.to_string())?;
                Ok(Value::Null)
            }
            Action::GetItem => {
                let payload: ItemKeyPayload = decode(action, request)?;
                let item = self
                    .store()?
                    .get_item(&payload.key)
                    .map_err(|e| e.to_string())?;
                to_data(item)
            }
            Action::SearchItems => {
                let query: ItemQuery = if request.payload.is_null() {
                    ItemQuery::default()
                } else {
                    decode(action, request)?
                };
                let items = self
                    .store()?
                    .search_items(&query)
                    .map_err(|e| e.to_string())?;
                to_data(items)
            }
            Action::GetHistory => {
                let payload: ItemKeyPayload = decode(action, request)?;
                let history = self
                    .store()?
                    .get_history(&payload.key)
                    .map_err(|e| e.to_string())?;
                to_data(history)
            }
            Action::ListRuns => {
                let payload: ListRunsPayload = if request.payload.is_null() {
                    ListRunsPayload {
                        target_id: None,
                        limit: 20,
                    }
                } else {
                    decode(action, request)?
                };
                let runs = self
                    .store()?
                    .recent_runs(payload.target_id.as_deref(), payload.limit)
                    .map_err(|e| e.to_string())?;
                to_data(runs)
            }
        }
    }

    /// The open store, opening it on first use.
    fn store(&mut self) -> Result<&mut Store, String> {
        if self.store.is_none() {
            let store = Store::open(&self.db_path)
                .map_err(|e| format!("failed to open {}: {}", self.db_path.display(), e))?;
            tracing::info!("opened database {}", self.db_path.display());
            self.store = Some(store);
        }
        self.store
            .as_mut()
            .ok_or_else(|| "database not initialized".to_string())
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    action: Action,
    request: &ProxyRequest,
) -> Result<T, String> {
    request
        .decode_payload()
        .map_err(|e| format!("invalid {} payload: {}", action, e))
}

fn to_data<T: Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("serialize error: {}", e))
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
