// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use chrono::{Duration, TimeZone};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn item(n: u64) -> RemoteItem {
    let updated = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(n as i64);
    RemoteItem::new(n.to_string(), format!("P-{n}"), "P", updated, json!({ "id": n }))
}

/// Serves a fixed item list; optionally fails once at a given offset.
struct FixedSource {
    items: Vec<RemoteItem>,
    reported_total: Option<u64>,
    fail_at: Mutex<Option<u64>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl FixedSource {
    fn new(count: u64) -> Self {
        FixedSource {
            items: (1..=count).map(item).collect(),
            reported_total: None,
            fail_at: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn offsets(&self) -> Vec<u64> {
        self.requests.lock().unwrap().iter().map(|r| r.offset).collect()
    }
}

impl PageSource for FixedSource {
    fn fetch_page(&self, request: PageRequest) -> BoxFuture<'_, SourceResult<Page>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            let mut fail_at = self.fail_at.lock().unwrap();
            if *fail_at == Some(request.offset) {
                *fail_at = None;
                return Err(SourceError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            let start = (request.offset as usize).min(self.items.len());
            let end = (start + request.page_size as usize).min(self.items.len());
            Ok(Page {
                items: self.items[start..end].to_vec(),
                total: self.reported_total.unwrap_or(self.items.len() as u64),
            })
        })
    }

    fn list_targets(&self) -> BoxFuture<'_, SourceResult<Vec<SyncTarget>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

async fn drain(iter: &mut BatchIterator<'_>) -> Vec<Vec<String>> {
    let mut batches = Vec::new();
    while let Some(batch) = iter.next_batch().await.unwrap() {
        batches.push(batch.into_iter().map(|i| i.id).collect());
    }
    batches
}

#[tokio::test]
async fn yields_pages_in_order_until_empty() {
    let source = FixedSource::new(5);
    let mut iter = BatchIterator::new(&source, "P", None, 2);

    let batches = drain(&mut iter).await;
    assert_eq!(
        batches,
        vec![vec!["1", "2"], vec!["3", "4"], vec!["5"]]
            .into_iter()
            .map(|b| b.into_iter().map(String::from).collect::<Vec<_>>())
            .collect::<Vec<_>>()
    );
    assert_eq!(iter.position(), 5);
    assert_eq!(source.offsets(), vec![0, 2, 4, 5]);
}

#[tokio::test]
async fn exhausted_iterator_does_not_refetch() {
    let source = FixedSource::new(1);
    let mut iter = BatchIterator::new(&source, "P", None, 10);
    drain(&mut iter).await;
    assert!(iter.next_batch().await.unwrap().is_none());
    assert_eq!(source.offsets(), vec![0, 1]);
}

#[tokio::test]
async fn starts_at_offset_without_rereading() {
    let source = FixedSource::new(4);
    let mut iter = BatchIterator::new(&source, "P", None, 2).starting_at(2);

    let batches = drain(&mut iter).await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], vec!["3".to_string(), "4".to_string()]);
    assert_eq!(source.offsets(), vec![2, 4]);
}

#[tokio::test]
async fn passes_filter_through() {
    let source = FixedSource::new(1);
    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut iter = BatchIterator::new(&source, "P", Some(since), 7);
    iter.next_batch().await.unwrap();

    let first = source.requests.lock().unwrap()[0].clone();
    assert_eq!(first.target_id, "P");
    assert_eq!(first.updated_since, Some(since));
    assert_eq!(first.page_size, 7);
}

#[tokio::test]
async fn progress_reports_position_and_total() {
    let mut source = FixedSource::new(3);
    source.reported_total = Some(99);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let mut iter = BatchIterator::new(&source, "P", None, 2)
        .with_progress(Box::new(move |pos, total| sink.lock().unwrap().push((pos, total))));
    drain(&mut iter).await;

    assert_eq!(*seen.lock().unwrap(), vec![(2, 99), (3, 99)]);
}

#[tokio::test]
async fn total_is_not_a_stop_condition() {
    let mut source = FixedSource::new(4);
    source.reported_total = Some(1);
    let mut iter = BatchIterator::new(&source, "P", None, 1);
    assert_eq!(drain(&mut iter).await.len(), 4);
}

#[tokio::test]
async fn error_does_not_advance() {
    let source = FixedSource::new(4);
    *source.fail_at.lock().unwrap() = Some(2);
    let mut iter = BatchIterator::new(&source, "P", None, 2);

    assert!(iter.next_batch().await.unwrap().is_some());
    let err = iter.next_batch().await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 503, .. }));
    assert_eq!(iter.position(), 2);

    let retry = iter.next_batch().await.unwrap().unwrap();
    assert_eq!(retry[0].id, "3");
    assert_eq!(source.offsets(), vec![0, 2, 2]);
}

#[tokio::test]
async fn empty_source_yields_nothing() {
    let source = FixedSource::new(0);
    let mut iter = BatchIterator::new(&source, "P", None, 5);
    assert!(iter.next_batch().await.unwrap().is_none());
    assert_eq!(iter.total(), 0);
}
