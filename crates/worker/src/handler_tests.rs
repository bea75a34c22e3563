// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{TimeZone, Utc};
use serde_json::json;
use trawl_ipc::{ItemRecord, SyncRun, UpsertOutcome};
use yare::parameterized;

fn handler() -> (tempfile::TempDir, Handler) {
    let dir = tempfile::tempdir().unwrap();
    let handler = Handler::new(dir.path().join("trawl.db"));
    (dir, handler)
}

fn item(id: &str, hour: u32) -> RemoteItem {
    let updated = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
    RemoteItem::new(
        id,
        format!("PROJ-{id}"),
        "PROJ",
        updated,
        json!({ "id": id, "key": format!("PROJ-{id}"), "fields": { "summary": "s" } }),
    )
}

fn call<P: Serialize>(handler: &mut Handler, action: Action, payload: &P) -> ProxyResponse {
    let request = ProxyRequest::new(action, payload, 1).unwrap();
    handler.handle(&request)
}

fn call_bare(handler: &mut Handler, action: Action) -> ProxyResponse {
    handler.handle(&ProxyRequest::bare(action, 1))
}

fn target() -> TargetPayload {
    TargetPayload {
        target_id: "PROJ".to_string(),
    }
}

#[test]
fn ping_echoes_sentinel_without_opening_database() {
    let (_dir, mut handler) = handler();
    let response = call_bare(&mut handler, Action::Ping);
    assert!(response.success);
    assert_eq!(response.data, Some(json!("pong")));
    assert!(!handler.is_initialized());
}

#[test]
fn response_echoes_request_id() {
    let (_dir, mut handler) = handler();
    let response = handler.handle(&ProxyRequest::bare(Action::Ping, 77));
    assert_eq!(response.request_id, 77);
}

#[test]
fn init_opens_database() {
    let (dir, mut handler) = handler();
    let response = call_bare(&mut handler, Action::Init);
    assert!(response.success, "{:?}", response.error);
    assert!(handler.is_initialized());
    assert!(dir.path().join("trawl.db").exists());

    let result: InitResult = response.decode_data().unwrap();
    assert!(result.db_path.ends_with("trawl.db"));
}

#[test]
fn init_is_idempotent() {
    let (_dir, mut handler) = handler();
    assert!(call_bare(&mut handler, Action::Init).success);
    assert!(call_bare(&mut handler, Action::Init).success);
}

#[test]
fn storage_action_opens_database_on_demand() {
    let (_dir, mut handler) = handler();
    let response = call(&mut handler, Action::GetCount, &target());
    assert!(response.success);
    assert_eq!(response.decode_data::<u64>().unwrap(), 0);
    assert!(handler.is_initialized());
}

#[test]
fn upsert_then_watermark_and_count() {
    let (_dir, mut handler) = handler();
    for (id, hour) in [("1", 1), ("2", 2), ("3", 3)] {
        let response = call(&mut handler, Action::UpsertItem, &item(id, hour));
        assert_eq!(
            response.decode_data::<UpsertOutcome>().unwrap(),
            UpsertOutcome::Inserted
        );
    }

    let mark: Watermark = call(&mut handler, Action::GetLatestUpdatedAt, &target())
        .decode_data()
        .unwrap();
    assert_eq!(
        mark.latest_updated_at,
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap())
    );

    let count: u64 = call(&mut handler, Action::GetCount, &target())
        .decode_data()
        .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn stale_upsert_reports_stale() {
    let (_dir, mut handler) = handler();
    call(&mut handler, Action::UpsertItem, &item("1", 5));
    let response = call(&mut handler, Action::UpsertItem, &item("1", 4));
    assert_eq!(
        response.decode_data::<UpsertOutcome>().unwrap(),
        UpsertOutcome::Stale
    );
}

#[test]
fn run_lifecycle_over_protocol() {
    let (_dir, mut handler) = handler();
    let started: RunStarted = call(&mut handler, Action::StartRun, &target())
        .decode_data()
        .unwrap();

    let progress = RunProgressPayload {
        run_id: started.run_id,
        items_synced: 2,
    };
    assert!(call(&mut handler, Action::UpdateRunProgress, &progress).success);
    assert!(call(&mut handler, Action::CompleteRun, &progress).success);
    assert!(call_bare(&mut handler, Action::Persist).success);

    let runs: Vec<SyncRun> = call(
        &mut handler,
        Action::ListRuns,
        &ListRunsPayload {
            target_id: Some("PROJ".to_string()),
            limit: 5,
        },
    )
    .decode_data()
    .unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].items_synced, 2);
    assert_eq!(runs[0].status, trawl_core::RunStatus::Completed);
}

#[test]
fn fail_run_records_message() {
    let (_dir, mut handler) = handler();
    let started: RunStarted = call(&mut handler, Action::StartRun, &target())
        .decode_data()
        .unwrap();
    let payload = FailRunPayload {
        run_id: started.run_id,
        items_synced: 0,
        error: "source unreachable".to_string(),
    };
    assert!(call(&mut handler, Action::FailRun, &payload).success);

    let runs: Vec<SyncRun> = call_bare(&mut handler, Action::ListRuns)
        .decode_data()
        .unwrap();
    assert_eq!(runs[0].error_message.as_deref(), Some("source unreachable"));
}

#[test]
fn unknown_run_is_operation_failure() {
    let (_dir, mut handler) = handler();
    let response = call(
        &mut handler,
        Action::CompleteRun,
        &RunProgressPayload {
            run_id: 999,
            items_synced: 0,
        },
    );
    assert!(!response.success);
    assert!(response.error.unwrap().contains("999"));
}

#[test]
fn browse_actions() {
    let (_dir, mut handler) = handler();
    call(&mut handler, Action::UpsertItem, &item("1", 1));
    call(&mut handler, Action::UpsertItem, &item("2", 2));

    let key = ItemKeyPayload {
        key: "PROJ-2".to_string(),
    };
    let record: ItemRecord = call(&mut handler, Action::GetItem, &key)
        .decode_data()
        .unwrap();
    assert_eq!(record.id, "2");
    assert!(record.raw.is_some());

    let items: Vec<ItemRecord> = call_bare(&mut handler, Action::SearchItems)
        .decode_data()
        .unwrap();
    assert_eq!(items.len(), 2);

    let history: Vec<trawl_ipc::HistoryEntry> = call(&mut handler, Action::GetHistory, &key)
        .decode_data()
        .unwrap();
    assert!(history.is_empty());
}

#[test]
fn missing_item_is_operation_failure() {
    let (_dir, mut handler) = handler();
    let response = call(
        &mut handler,
        Action::GetItem,
        &ItemKeyPayload {
            key: "PROJ-9".to_string(),
        },
    );
    assert!(!response.success);
    assert!(response.error.unwrap().contains("PROJ-9"));
}

#[parameterized(
    count = { Action::GetCount },
    latest = { Action::GetLatestUpdatedAt },
    start_run = { Action::StartRun },
    upsert = { Action::UpsertItem },
    fail_run = { Action::FailRun },
)]
fn missing_payload_is_rejected(action: Action) {
    let (_dir, mut handler) = handler();
    let response = call_bare(&mut handler, action);
    assert!(!response.success);
    let error = response.error.unwrap();
    assert!(error.starts_with(&format!("invalid {} payload", action)), "{error}");
}

#[test]
fn unknown_action_gets_error_response() {
    let (_dir, mut handler) = handler();
    let request: ProxyRequest = serde_json::from_value(json!({
        "target": "storage",
        "action": "VACUUM",
        "requestId": 3
    }))
    .unwrap();
    let response = handler.handle(&request);
    assert!(!response.success);
    assert_eq!(response.request_id, 3);
    assert!(response.error.unwrap().contains("VACUUM"));
}

#[test]
fn unknown_target_gets_error_response() {
    let (_dir, mut handler) = handler();
    let mut request = ProxyRequest::bare(Action::Ping, 4);
    request.target = "search".to_string();
    let response = handler.handle(&request);
    assert!(!response.success);
    assert!(response.error.unwrap().contains("unknown target"));
}

#[test]
fn status_reports_initialization() {
    let (_dir, mut handler) = handler();
    let status: WorkerStatus = call_bare(&mut handler, Action::Status)
        .decode_data()
        .unwrap();
    assert_eq!(status.pid, std::process::id());
    assert!(!status.initialized);

    call_bare(&mut handler, Action::Init);
    let status: WorkerStatus = call_bare(&mut handler, Action::Status)
        .decode_data()
        .unwrap();
    assert!(status.initialized);
}

#[test]
fn unopenable_database_is_operation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "x").unwrap();
    let mut handler = Handler::new(blocker.join("trawl.db"));

    let response = call_bare(&mut handler, Action::Init);
    assert!(!response.success);
    assert!(response.error.unwrap().starts_with("failed to open"));
    assert!(!handler.is_initialized());
}
