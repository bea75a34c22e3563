// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Paginated read access to the remote issue tracker.
//!
//! [`PageSource`] is the one-page-at-a-time contract a tracker client
//! implements. [`BatchIterator`] turns it into an ordered, resumable sequence
//! of non-empty batches.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use trawl_core::{RemoteItem, SyncTarget};

mod jira;
mod pager;

pub use jira::JiraSource;
pub use pager::{BatchIterator, ProgressFn};

/// Error type for source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The tracker answered with a non-success status.
    #[error("tracker returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// An item in an otherwise valid page is missing a required field.
    #[error("invalid item: {0}")]
    InvalidItem(String),
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// One page query: `(target, updated_since?, offset, page_size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub target_id: String,
    pub updated_since: Option<DateTime<Utc>>,
    pub offset: u64,
    pub page_size: u32,
}

/// One page of results. `total` is the source's estimate at fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<RemoteItem>,
    pub total: u64,
}

/// A paginated, filtered view of the remote tracker.
///
/// Implementations return items in ascending `updated_at` order with a
/// stable tie-break, so an offset into the result set is meaningful across
/// calls with the same filter.
pub trait PageSource: Send + Sync {
    /// Fetch one page. No retries are performed.
    fn fetch_page(&self, request: PageRequest) -> BoxFuture<'_, SourceResult<Page>>;

    /// List the collections that can be synced.
    fn list_targets(&self) -> BoxFuture<'_, SourceResult<Vec<SyncTarget>>>;
}

#[cfg(test)]
#[path = "pager_tests.rs"]
mod pager_tests;
