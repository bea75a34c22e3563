// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::proxy::ProxyError;
use crate::source::SourceError;

/// All possible errors that can occur in the trawl coordinator.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Network, auth, or decoding failure against the remote tracker.
    #[error("source fetch failed: {0}")]
    SourceFetch(#[from] SourceError),

    /// The storage worker could not be created, never became ready, or
    /// dropped a response.
    #[error("storage worker unavailable: {0}")]
    ProxyTransport(ProxyError),

    /// The worker executed an action but the storage engine rejected it.
    #[error("storage operation failed: {0}")]
    ProxyOperation(String),

    #[error("a sync is already running")]
    AlreadyRunning,

    #[error("sync cancelled")]
    Cancelled,

    #[error("sync failed for {0} target(s)\n  hint: run 'trawl runs' for details, then 'trawl sync' to resume")]
    SyncFailed(usize),

    #[error("unknown target: '{0}'\n  hint: run 'trawl targets discover' to list targets from the source")]
    TargetNotFound(String),

    #[error("no source configured\n  hint: set [source] url in {0}")]
    SourceNotConfigured(String),

    #[error("checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("worker error: {0}")]
    Worker(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for trawl operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<ProxyError> for Error {
    fn from(e: ProxyError) -> Self {
        match e {
            ProxyError::OperationFailed(message) => Error::ProxyOperation(message),
            other => Error::ProxyTransport(other),
        }
    }
}

impl Error {
    /// True for a user-requested stop, which is reported apart from failures.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
