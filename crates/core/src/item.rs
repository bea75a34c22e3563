// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Items mirrored from the remote tracker.
//!
//! A [`RemoteItem`] is the unit fetched from the source: an opaque JSON
//! payload plus the stable identity and `updated_at` watermark the sync
//! engine relies on. The storage engine decomposes it into [`ItemFields`]
//! and a set of [`HistoryEntry`] rows derived from the payload's changelog.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Timestamp layout used by Jira-style trackers (`2024-01-02T03:04:05.000+0000`).
const SOURCE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Parse a timestamp as emitted by the source.
///
/// Accepts RFC 3339 as well as the offset-without-colon layout common in
/// issue tracker APIs.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_str(value, SOURCE_TIMESTAMP_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| Error::InvalidTimestamp(value.to_string()))
}

/// Format a timestamp for storage.
///
/// Fixed-width millisecond precision in UTC, so stored values sort
/// lexicographically in time order.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// An item fetched from the remote source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Stable source identifier, used as the upsert key.
    pub id: String,
    /// Human-facing key (e.g. `PROJ-123`).
    pub key: String,
    /// The sync target this item belongs to.
    pub target_id: String,
    /// Last modification time reported by the source.
    pub updated_at: DateTime<Utc>,
    /// Full source payload.
    pub payload: Value,
}

impl RemoteItem {
    /// Build an item from its parts.
    pub fn new(
        id: impl Into<String>,
        key: impl Into<String>,
        target_id: impl Into<String>,
        updated_at: DateTime<Utc>,
        payload: Value,
    ) -> Self {
        RemoteItem {
            id: id.into(),
            key: key.into(),
            target_id: target_id.into(),
            updated_at,
            payload,
        }
    }

    /// Extract identity and watermark from a source payload.
    ///
    /// `id` may be a string or a number; `key` falls back to `id`;
    /// `fields.updated` is required.
    pub fn from_payload(target_id: &str, payload: Value) -> Result<Self> {
        let id = match payload.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Error::InvalidItem("missing id".to_string())),
        };
        let key = payload
            .get("key")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| id.clone());
        let updated = payload
            .pointer("/fields/updated")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidItem(format!("{key}: missing fields.updated")))?;
        let updated_at = parse_timestamp(updated)?;

        Ok(RemoteItem {
            id,
            key,
            target_id: target_id.to_string(),
            updated_at,
            payload,
        })
    }

    /// Normalized fields extracted from the payload.
    pub fn fields(&self) -> ItemFields {
        let fields = self.payload.get("fields");
        let text = |path: &str| {
            fields
                .and_then(|f| f.pointer(path))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        ItemFields {
            summary: text("/summary"),
            status: text("/status/name"),
            issue_type: text("/issuetype/name"),
            priority: text("/priority/name"),
            assignee: text("/assignee/displayName"),
            reporter: text("/reporter/displayName"),
            resolution: text("/resolution/name"),
            created_at: text("/created").and_then(|s| parse_timestamp(&s).ok()),
        }
    }

    /// Change-history rows derived from `changelog.histories[*].items[*]`.
    ///
    /// Histories without an id or a parseable `created` timestamp are skipped,
    /// as are change items without a field name.
    pub fn history_entries(&self) -> Vec<HistoryEntry> {
        let Some(histories) = self
            .payload
            .pointer("/changelog/histories")
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        let mut entries = Vec::new();
        for history in histories {
            let history_id = match history.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => continue,
            };
            let Some(created_at) = history
                .get("created")
                .and_then(Value::as_str)
                .and_then(|s| parse_timestamp(s).ok())
            else {
                continue;
            };
            let author = history
                .pointer("/author/displayName")
                .and_then(Value::as_str)
                .map(str::to_string);

            let items = history.get("items").and_then(Value::as_array);
            for change in items.into_iter().flatten() {
                let Some(field) = change.get("field").and_then(Value::as_str) else {
                    continue;
                };
                entries.push(HistoryEntry {
                    item_id: self.id.clone(),
                    history_id: history_id.clone(),
                    field: field.to_string(),
                    author: author.clone(),
                    from_value: change
                        .get("fromString")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    to_value: change
                        .get("toString")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    created_at,
                });
            }
        }
        entries
    }
}

/// Normalized columns stored alongside the raw payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFields {
    pub summary: Option<String>,
    pub status: Option<String>,
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub resolution: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One field change from an item's history.
///
/// Keyed by `(item_id, history_id, field)`; re-syncing an unchanged range
/// never produces a second row for the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub item_id: String,
    pub history_id: String,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A stored item as returned by browse queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub key: String,
    pub target_id: String,
    #[serde(flatten)]
    pub fields: ItemFields,
    pub updated_at: DateTime<Utc>,
    /// Raw payload, only populated for single-item lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Filters for browsing stored items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Case-insensitive substring match on key and summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default = "default_query_limit")]
    pub limit: usize,
}

fn default_query_limit() -> usize {
    50
}

impl Default for ItemQuery {
    fn default() -> Self {
        ItemQuery {
            target_id: None,
            text: None,
            status: None,
            limit: default_query_limit(),
        }
    }
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
