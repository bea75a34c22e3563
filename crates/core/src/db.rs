// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed storage engine for mirrored items.
//!
//! The [`Store`] owns the items table (normalized columns plus the raw
//! payload), the append-only change history, and the sync run audit log.
//! Upserts are guarded by `updated_at` so replaying an older copy of an item
//! never regresses newer state.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::error::{Error, Result};
use crate::item::{
    format_timestamp, parse_timestamp, HistoryEntry, ItemFields, ItemQuery, ItemRecord,
    RemoteItem,
};
use crate::run::{RunStatus, SyncRun};

/// SQL schema for the mirror database.
pub const SCHEMA: &str = r#"
-- Mirrored items: normalized columns plus the raw source payload
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    key TEXT NOT NULL,
    target_id TEXT NOT NULL,
    summary TEXT,
    status TEXT,
    issue_type TEXT,
    priority TEXT,
    assignee TEXT,
    reporter TEXT,
    resolution TEXT,
    created_at TEXT,
    updated_at TEXT NOT NULL,
    updated_ms INTEGER NOT NULL,
    raw TEXT NOT NULL
);

-- Change history derived from item changelogs (append-only)
CREATE TABLE IF NOT EXISTS history (
    item_id TEXT NOT NULL,
    history_id TEXT NOT NULL,
    field TEXT NOT NULL,
    author TEXT,
    from_value TEXT,
    to_value TEXT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (item_id, history_id, field)
);

-- Sync run audit log
CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    target_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL DEFAULT 'running',
    items_synced INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_items_target_updated ON items(target_id, updated_ms);
CREATE INDEX IF NOT EXISTS idx_items_key ON items(key);
CREATE INDEX IF NOT EXISTS idx_history_item ON history(item_id);
CREATE INDEX IF NOT EXISTS idx_runs_target ON sync_runs(target_id, started_at);
"#;

const ITEM_COLUMNS: &str = "id, key, target_id, summary, status, issue_type, priority, \
     assignee, reporter, resolution, created_at, updated_at, raw";

/// Outcome of applying one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// The item was not stored before.
    Inserted,
    /// The stored copy was overwritten (incoming `updated_at` >= stored).
    Updated,
    /// The stored copy is newer; nothing was written.
    Stale,
}

/// Parse an RFC3339 timestamp column, returning a rusqlite error on failure.
fn parse_timestamp_col(
    value: &str,
    column: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    parse_timestamp(value).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid timestamp '{value}' in column '{column}'"
            ))),
        )
    })
}

/// Parse a string value from the database, returning a rusqlite error on parse failure.
fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

fn item_from_row(row: &Row<'_>, with_raw: bool) -> std::result::Result<ItemRecord, rusqlite::Error> {
    let created: Option<String> = row.get(10)?;
    let updated: String = row.get(11)?;
    let raw = if with_raw {
        let text: String = row.get(12)?;
        Some(serde_json::from_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                12,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?)
    } else {
        None
    };

    Ok(ItemRecord {
        id: row.get(0)?,
        key: row.get(1)?,
        target_id: row.get(2)?,
        fields: ItemFields {
            summary: row.get(3)?,
            status: row.get(4)?,
            issue_type: row.get(5)?,
            priority: row.get(6)?,
            assignee: row.get(7)?,
            reporter: row.get(8)?,
            resolution: row.get(9)?,
            created_at: created
                .map(|s| parse_timestamp_col(&s, "created_at"))
                .transpose()?,
        },
        updated_at: parse_timestamp_col(&updated, "updated_at")?,
        raw,
    })
}

fn run_from_row(row: &Row<'_>) -> std::result::Result<SyncRun, rusqlite::Error> {
    let started: String = row.get(2)?;
    let completed: Option<String> = row.get(3)?;
    let status: String = row.get(4)?;
    let items: i64 = row.get(5)?;

    Ok(SyncRun {
        id: row.get(0)?,
        target_id: row.get(1)?,
        started_at: parse_timestamp_col(&started, "started_at")?,
        completed_at: completed
            .map(|s| parse_timestamp_col(&s, "completed_at"))
            .transpose()?,
        status: parse_db(&status, "status")?,
        items_synced: u64::try_from(items).unwrap_or(0),
        error_message: row.get(6)?,
    })
}

/// Insert a history row unless its `(item_id, history_id, field)` key exists.
fn insert_history(conn: &Connection, entry: &HistoryEntry) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO history
         (item_id, history_id, field, author, from_value, to_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.item_id,
            entry.history_id,
            entry.field,
            entry.author,
            entry.from_value,
            entry.to_value,
            format_timestamp(&entry.created_at),
        ],
    )?;
    Ok(inserted > 0)
}

/// Run schema creation on a database connection.
///
/// Every statement is idempotent, so this is safe to call on every open.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// SQLite storage engine.
pub struct Store {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl Store {
    /// Open a database at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets readers proceed while the sync writer upserts
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        let store = Store { conn };
        run_migrations(&store.conn)?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn };
        run_migrations(&store.conn)?;
        Ok(store)
    }

    /// Apply one item, overwriting only when it is at least as new as the
    /// stored copy. History rows derived from the payload are written in the
    /// same transaction.
    pub fn upsert_item(&mut self, item: &RemoteItem) -> Result<UpsertOutcome> {
        let fields = item.fields();
        let raw = serde_json::to_string(&item.payload)?;
        let incoming_ms = item.updated_at.timestamp_millis();

        let tx = self.conn.transaction()?;
        let stored_ms: Option<i64> = tx
            .query_row(
                "SELECT updated_ms FROM items WHERE id = ?1",
                params![item.id],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match stored_ms {
            Some(stored) if incoming_ms < stored => UpsertOutcome::Stale,
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };

        if outcome != UpsertOutcome::Stale {
            tx.execute(
                "INSERT INTO items (id, key, target_id, summary, status, issue_type, priority,
                     assignee, reporter, resolution, created_at, updated_at, updated_ms, raw)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(id) DO UPDATE SET
                     key = excluded.key,
                     target_id = excluded.target_id,
                     summary = excluded.summary,
                     status = excluded.status,
                     issue_type = excluded.issue_type,
                     priority = excluded.priority,
                     assignee = excluded.assignee,
                     reporter = excluded.reporter,
                     resolution = excluded.resolution,
                     created_at = excluded.created_at,
                     updated_at = excluded.updated_at,
                     updated_ms = excluded.updated_ms,
                     raw = excluded.raw
                 WHERE excluded.updated_ms >= items.updated_ms",
                params![
                    item.id,
                    item.key,
                    item.target_id,
                    fields.summary,
                    fields.status,
                    fields.issue_type,
                    fields.priority,
                    fields.assignee,
                    fields.reporter,
                    fields.resolution,
                    fields.created_at.as_ref().map(format_timestamp),
                    format_timestamp(&item.updated_at),
                    incoming_ms,
                    raw,
                ],
            )?;

            for entry in item.history_entries() {
                insert_history(&tx, &entry)?;
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    /// Append a history entry. Returns false if the key was already present.
    pub fn record_history_entry(&self, entry: &HistoryEntry) -> Result<bool> {
        insert_history(&self.conn, entry)
    }

    /// The watermark for a target: the newest stored `updated_at`.
    pub fn latest_updated_at(&self, target_id: &str) -> Result<Option<DateTime<Utc>>> {
        let max_ms: Option<i64> = self.conn.query_row(
            "SELECT MAX(updated_ms) FROM items WHERE target_id = ?1",
            params![target_id],
            |row| row.get(0),
        )?;

        match max_ms {
            None => Ok(None),
            Some(ms) => DateTime::from_timestamp_millis(ms)
                .map(Some)
                .ok_or_else(|| Error::CorruptedData(format!("invalid updated_ms {ms}"))),
        }
    }

    /// Number of items stored for a target.
    pub fn count(&self, target_id: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM items WHERE target_id = ?1",
            params![target_id],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Look up one item by key or id, including its raw payload.
    pub fn get_item(&self, key_or_id: &str) -> Result<ItemRecord> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE key = ?1 OR id = ?1 LIMIT 1");
        self.conn
            .query_row(&sql, params![key_or_id], |row| item_from_row(row, true))
            .optional()?
            .ok_or_else(|| Error::ItemNotFound(key_or_id.to_string()))
    }

    /// Browse stored items, newest first.
    pub fn search_items(&self, query: &ItemQuery) -> Result<Vec<ItemRecord>> {
        let mut sql = format!("SELECT {ITEM_COLUMNS} FROM items");
        let mut conditions = Vec::new();
        let mut params_vec: Vec<String> = Vec::new();

        if let Some(target) = &query.target_id {
            conditions.push("target_id = ?");
            params_vec.push(target.clone());
        }

        if let Some(status) = &query.status {
            conditions.push("LOWER(status) = ?");
            params_vec.push(status.to_lowercase());
        }

        if let Some(text) = &query.text {
            let pattern = format!("%{}%", text.to_lowercase());
            conditions.push("(LOWER(key) LIKE ? OR LOWER(summary) LIKE ?)");
            params_vec.push(pattern.clone());
            params_vec.push(pattern);
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        sql.push_str(&format!(" ORDER BY updated_ms DESC, key ASC LIMIT {}", query.limit));

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec
            .iter()
            .map(|s| s as &dyn rusqlite::ToSql)
            .collect();

        let items = stmt
            .query_map(params_refs.as_slice(), |row| item_from_row(row, false))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Change history for an item (by key or id), oldest first.
    pub fn get_history(&self, key_or_id: &str) -> Result<Vec<HistoryEntry>> {
        let item = self.get_item(key_or_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT item_id, history_id, field, author, from_value, to_value, created_at
             FROM history WHERE item_id = ?1
             ORDER BY created_at ASC, history_id ASC, field ASC",
        )?;

        let entries = stmt
            .query_map(params![item.id], |row| {
                let created: String = row.get(6)?;
                Ok(HistoryEntry {
                    item_id: row.get(0)?,
                    history_id: row.get(1)?,
                    field: row.get(2)?,
                    author: row.get(3)?,
                    from_value: row.get(4)?,
                    to_value: row.get(5)?,
                    created_at: parse_timestamp_col(&created, "created_at")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Open a new run record in the `running` state.
    pub fn start_run(&self, target_id: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sync_runs (target_id, started_at, status, items_synced)
             VALUES (?1, ?2, 'running', 0)",
            params![target_id, format_timestamp(&Utc::now())],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Record the absolute processed count of a running run.
    ///
    /// Setting (not incrementing) keeps the update idempotent under retries.
    pub fn update_run_progress(&self, run_id: i64, items_synced: u64) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_runs SET items_synced = ?1 WHERE id = ?2 AND status = 'running'",
            params![items_synced as i64, run_id],
        )?;
        self.ensure_run_exists(run_id)
    }

    /// Mark a run completed. A second completion is a no-op.
    pub fn complete_run(&self, run_id: i64, items_synced: u64) -> Result<()> {
        self.finish_run(run_id, RunStatus::Completed, items_synced, None)
    }

    /// Mark a run failed with an error message.
    pub fn fail_run(&self, run_id: i64, items_synced: u64, error_message: &str) -> Result<()> {
        self.finish_run(run_id, RunStatus::Failed, items_synced, Some(error_message))
    }

    fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        items_synced: u64,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_runs
             SET status = ?1, completed_at = ?2, items_synced = ?3, error_message = ?4
             WHERE id = ?5 AND status = 'running'",
            params![
                status.as_str(),
                format_timestamp(&Utc::now()),
                items_synced as i64,
                error_message,
                run_id
            ],
        )?;
        self.ensure_run_exists(run_id)
    }

    fn ensure_run_exists(&self, run_id: i64) -> Result<()> {
        let exists: bool = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM sync_runs WHERE id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(Error::RunNotFound(run_id))
        }
    }

    /// Get a run by id.
    pub fn get_run(&self, run_id: i64) -> Result<SyncRun> {
        self.conn
            .query_row(
                "SELECT id, target_id, started_at, completed_at, status, items_synced, error_message
                 FROM sync_runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(Error::RunNotFound(run_id))
    }

    /// Most recent runs, optionally for one target.
    pub fn recent_runs(&self, target_id: Option<&str>, limit: usize) -> Result<Vec<SyncRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, target_id, started_at, completed_at, status, items_synced, error_message
             FROM sync_runs
             WHERE ?1 IS NULL OR target_id = ?1
             ORDER BY id DESC LIMIT ?2",
        )?;
        let runs = stmt
            .query_map(params![target_id, limit as i64], run_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    /// Flush the write-ahead log into the main database file.
    pub fn persist(&self) -> Result<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
