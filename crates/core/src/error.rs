// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for trawl-core operations.

use thiserror::Error;

/// All possible errors that can occur in trawl-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("sync run not found: {0}")]
    RunNotFound(i64),

    #[error("invalid run status: '{0}'\n  hint: valid statuses are: running, completed, failed")]
    InvalidRunStatus(String),

    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for trawl-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
