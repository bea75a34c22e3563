// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Progress events and sync status.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Phase name carried by item progress events.
pub const ITEMS_PHASE: &str = "items";

const CHANNEL_CAPACITY: usize = 64;

/// Progress of one target's run. `total` is the source's estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub target_id: String,
    pub phase: String,
    pub current: u64,
    pub total: u64,
    pub message: String,
}

impl ProgressEvent {
    pub fn items(target_id: &str, current: u64, total: u64) -> Self {
        ProgressEvent {
            target_id: target_id.to_string(),
            phase: ITEMS_PHASE.to_string(),
            current,
            total,
            message: format!("{}: {}/{} items", target_id, current, total),
        }
    }
}

/// Snapshot returned by a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub progress: Option<ProgressEvent>,
}

/// Fan-out of progress events to whoever is listening.
///
/// Publishing never fails and never blocks. With no subscribers events are
/// dropped, and a subscriber that falls behind loses the oldest events.
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        ProgressPublisher { sender }
    }

    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}
