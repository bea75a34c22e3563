// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{DateTime, TimeZone, Utc};
use trawl_core::{ItemFields, RunStatus};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

fn record(key: &str, status: Option<&str>, summary: &str) -> ItemRecord {
    ItemRecord {
        id: format!("id-{key}"),
        key: key.to_string(),
        target_id: "PROJ".to_string(),
        fields: ItemFields {
            summary: Some(summary.to_string()),
            status: status.map(str::to_string),
            ..ItemFields::default()
        },
        updated_at: at(12),
        raw: None,
    }
}

#[test]
fn query_from_filters() {
    let filter = ItemFilterArgs {
        target: Some("PROJ".to_string()),
        status: Some("Done".to_string()),
    };
    let query = build_query(filter, Some("login".to_string()), 10);
    assert_eq!(
        query,
        ItemQuery {
            target_id: Some("PROJ".to_string()),
            text: Some("login".to_string()),
            status: Some("Done".to_string()),
            limit: 10,
        }
    );
}

#[test]
fn items_are_aligned() {
    let items = vec![
        record("PROJ-1", Some("Open"), "First"),
        record("PROJ-10", None, "Second"),
    ];
    assert_eq!(
        format_items(&items),
        "PROJ-1   Open  First\n\
         PROJ-10  -     Second\n"
    );
}

#[test]
fn details_include_known_fields_and_history() {
    let mut item = record("PROJ-1", Some("Done"), "Fix login");
    item.fields.assignee = Some("Robin".to_string());
    let history = vec![HistoryEntry {
        item_id: item.id.clone(),
        history_id: "h1".to_string(),
        field: "status".to_string(),
        author: Some("Sam".to_string()),
        from_value: Some("Open".to_string()),
        to_value: Some("Done".to_string()),
        created_at: at(11),
    }];

    assert_eq!(
        format_details(&item, &history),
        "PROJ-1: Fix login\n\
         Target: PROJ\n\
         Status: Done\n\
         Assignee: Robin\n\
         Updated: 2024-03-01 12:00 UTC\n\
         \n\
         History:\n  \
         2024-03-01 11:00 UTC  status: Open -> Done (Sam)\n"
    );
}

#[test]
fn details_without_history() {
    let out = format_details(&record("PROJ-2", None, "Quiet"), &[]);
    assert!(out.starts_with("PROJ-2: Quiet\n"));
    assert!(!out.contains("History"));
}

#[test]
fn runs_show_errors() {
    let runs = vec![
        SyncRun {
            id: 2,
            target_id: "PROJ".to_string(),
            started_at: at(9),
            completed_at: None,
            status: RunStatus::Failed,
            items_synced: 50,
            error_message: Some("cancelled".to_string()),
        },
        SyncRun {
            id: 1,
            target_id: "PROJ".to_string(),
            started_at: at(8),
            completed_at: Some(at(8)),
            status: RunStatus::Completed,
            items_synced: 120,
            error_message: None,
        },
    ];
    assert_eq!(
        format_runs(&runs),
        "#2 PROJ failed 50 items, started 2024-03-01 09:00 UTC: cancelled\n\
         #1 PROJ completed 120 items, started 2024-03-01 08:00 UTC\n"
    );
}
