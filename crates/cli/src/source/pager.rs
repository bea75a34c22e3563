// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Batch iteration over a [`PageSource`].

use chrono::{DateTime, Utc};
use trawl_core::RemoteItem;

use super::{PageRequest, PageSource, SourceResult};

/// Called after each batch with `(items_seen_so_far, total_reported_by_source)`.
pub type ProgressFn = Box<dyn FnMut(u64, u64) + Send>;

/// Yields non-empty batches in source order, starting at any offset.
///
/// The sequence ends only when the source returns an empty page at the
/// current offset; the reported total is an estimate and never used to stop.
/// A failed fetch leaves the position unchanged, so calling
/// [`next_batch`](Self::next_batch) again retries the same page.
pub struct BatchIterator<'a> {
    source: &'a dyn PageSource,
    target_id: String,
    updated_since: Option<DateTime<Utc>>,
    page_size: u32,
    position: u64,
    total: u64,
    exhausted: bool,
    on_progress: Option<ProgressFn>,
}

impl<'a> BatchIterator<'a> {
    pub fn new(
        source: &'a dyn PageSource,
        target_id: impl Into<String>,
        updated_since: Option<DateTime<Utc>>,
        page_size: u32,
    ) -> Self {
        BatchIterator {
            source,
            target_id: target_id.into(),
            updated_since,
            page_size: page_size.max(1),
            position: 0,
            total: 0,
            exhausted: false,
            on_progress: None,
        }
    }

    /// Skip the first `offset` items without fetching them.
    pub fn starting_at(mut self, offset: u64) -> Self {
        self.position = offset;
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Items consumed so far, including the starting offset.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total last reported by the source (0 before the first page).
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Fetch the next batch, or `None` once the source has no more items.
    pub async fn next_batch(&mut self) -> SourceResult<Option<Vec<RemoteItem>>> {
        if self.exhausted {
            return Ok(None);
        }

        let request = PageRequest {
            target_id: self.target_id.clone(),
            updated_since: self.updated_since,
            offset: self.position,
            page_size: self.page_size,
        };
        let page = self.source.fetch_page(request).await?;

        if page.items.is_empty() {
            tracing::debug!(
                target_id = %self.target_id,
                position = self.position,
                "source exhausted"
            );
            self.exhausted = true;
            return Ok(None);
        }

        self.position += page.items.len() as u64;
        self.total = page.total;
        if let Some(on_progress) = self.on_progress.as_mut() {
            on_progress(self.position, self.total);
        }
        Ok(Some(page.items))
    }
}
