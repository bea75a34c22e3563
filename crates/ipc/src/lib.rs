// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Storage proxy protocol between the `trawl` coordinator and the `trawld`
//! worker.
//!
//! Every request is an envelope `{target, action, payload, requestId}` and
//! yields exactly one response `{requestId, success, data | error}`.
//! Messages are serialized as JSON with length-prefixed framing.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only request target the worker serves.
pub const STORAGE_TARGET: &str = "storage";

/// Sentinel the worker echoes in reply to [`Action::Ping`].
pub const PING_SENTINEL: &str = "pong";

/// Error returned by `FromStr` impls for protocol types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unknown action name.
    InvalidAction(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidAction(s) => write!(f, "invalid action: '{}'", s),
        }
    }
}

impl std::error::Error for ParseError {}

// ============================================================================
// Actions
// ============================================================================

/// Operations the storage worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Liveness probe. Answered with [`PING_SENTINEL`].
    Ping,
    /// Open (or create) the database.
    Init,
    UpsertItem,
    GetLatestUpdatedAt,
    GetCount,
    StartRun,
    UpdateRunProgress,
    CompleteRun,
    FailRun,
    /// Flush the durable image to disk.
    Persist,
    GetItem,
    SearchItems,
    GetHistory,
    ListRuns,
    /// Worker process information.
    Status,
    /// Graceful shutdown.
    Shutdown,
}

impl Action {
    /// Returns the wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Ping => "PING",
            Action::Init => "INIT",
            Action::UpsertItem => "UPSERT_ITEM",
            Action::GetLatestUpdatedAt => "GET_LATEST_UPDATED_AT",
            Action::GetCount => "GET_COUNT",
            Action::StartRun => "START_RUN",
            Action::UpdateRunProgress => "UPDATE_RUN_PROGRESS",
            Action::CompleteRun => "COMPLETE_RUN",
            Action::FailRun => "FAIL_RUN",
            Action::Persist => "PERSIST",
            Action::GetItem => "GET_ITEM",
            Action::SearchItems => "SEARCH_ITEMS",
            Action::GetHistory => "GET_HISTORY",
            Action::ListRuns => "LIST_RUNS",
            Action::Status => "STATUS",
            Action::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, ParseError> {
        match s.to_uppercase().as_str() {
            "PING" => Ok(Action::Ping),
            "INIT" => Ok(Action::Init),
            "UPSERT_ITEM" => Ok(Action::UpsertItem),
            "GET_LATEST_UPDATED_AT" => Ok(Action::GetLatestUpdatedAt),
            "GET_COUNT" => Ok(Action::GetCount),
            "START_RUN" => Ok(Action::StartRun),
            "UPDATE_RUN_PROGRESS" => Ok(Action::UpdateRunProgress),
            "COMPLETE_RUN" => Ok(Action::CompleteRun),
            "FAIL_RUN" => Ok(Action::FailRun),
            "PERSIST" => Ok(Action::Persist),
            "GET_ITEM" => Ok(Action::GetItem),
            "SEARCH_ITEMS" => Ok(Action::SearchItems),
            "GET_HISTORY" => Ok(Action::GetHistory),
            "LIST_RUNS" => Ok(Action::ListRuns),
            "STATUS" => Ok(Action::Status),
            "SHUTDOWN" => Ok(Action::Shutdown),
            _ => Err(ParseError::InvalidAction(s.to_string())),
        }
    }
}

// ============================================================================
// Envelopes
// ============================================================================

/// Request sent from the coordinator to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    /// Always [`STORAGE_TARGET`].
    pub target: String,
    /// Action name. Kept as a string so unknown actions still get a response.
    pub action: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    /// Correlation id, echoed in the response.
    pub request_id: u64,
}

impl ProxyRequest {
    /// Build a storage request with a serialized payload.
    pub fn new<P: Serialize>(
        action: Action,
        payload: &P,
        request_id: u64,
    ) -> serde_json::Result<Self> {
        Ok(ProxyRequest {
            target: STORAGE_TARGET.to_string(),
            action: action.as_str().to_string(),
            payload: serde_json::to_value(payload)?,
            request_id,
        })
    }

    /// Build a storage request without a payload.
    pub fn bare(action: Action, request_id: u64) -> Self {
        ProxyRequest {
            target: STORAGE_TARGET.to_string(),
            action: action.as_str().to_string(),
            payload: Value::Null,
            request_id,
        }
    }

    /// Parse the action name.
    pub fn action(&self) -> Result<Action, ParseError> {
        self.action.parse()
    }

    /// Decode the payload into a typed value.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.payload)
    }
}

/// Response sent from the worker to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub request_id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProxyResponse {
    /// A successful response carrying `data`.
    pub fn ok(request_id: u64, data: Value) -> Self {
        ProxyResponse {
            request_id,
            success: true,
            data: if data.is_null() { None } else { Some(data) },
            error: None,
        }
    }

    /// A failed response.
    pub fn err(request_id: u64, message: impl Into<String>) -> Self {
        ProxyResponse {
            request_id,
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Decode `data` into a typed value. A missing `data` decodes as `null`.
    pub fn decode_data<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        match &self.data {
            Some(value) => T::deserialize(value),
            None => T::deserialize(&Value::Null),
        }
    }
}

// ============================================================================
// Payloads
// ============================================================================

// Model types carried as payloads or response data:
// `UPSERT_ITEM` takes a `RemoteItem` and answers an `UpsertOutcome`,
// `SEARCH_ITEMS` takes an `ItemQuery` and answers `Vec<ItemRecord>`,
// `GET_ITEM` answers an `ItemRecord`, `GET_HISTORY` a `Vec<HistoryEntry>`,
// and `LIST_RUNS` a `Vec<SyncRun>`.
pub use trawl_core::{
    HistoryEntry, ItemQuery, ItemRecord, RemoteItem, RunStatus, SyncRun, UpsertOutcome,
};

/// Payload naming a single sync target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPayload {
    pub target_id: String,
}

/// Payload naming a single item by key or id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemKeyPayload {
    pub key: String,
}

/// Payload for `START_RUN` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStarted {
    pub run_id: i64,
}

/// Payload for `UPDATE_RUN_PROGRESS` and `COMPLETE_RUN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgressPayload {
    pub run_id: i64,
    /// Absolute count of items processed so far.
    pub items_synced: u64,
}

/// Payload for `FAIL_RUN`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailRunPayload {
    pub run_id: i64,
    pub items_synced: u64,
    pub error: String,
}

/// Payload for `LIST_RUNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRunsPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default = "default_run_limit")]
    pub limit: usize,
}

fn default_run_limit() -> usize {
    20
}

/// Response data for `GET_LATEST_UPDATED_AT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub latest_updated_at: Option<DateTime<Utc>>,
}

/// Response data for `INIT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResult {
    pub db_path: String,
}

/// Worker status information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    /// Worker PID.
    pub pid: u32,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Whether `INIT` has opened the database.
    pub initialized: bool,
}

impl WorkerStatus {
    /// Create a new status with the given parameters.
    pub fn new(pid: u32, uptime_secs: u64, initialized: bool) -> Self {
        Self {
            pid,
            uptime_secs,
            initialized,
        }
    }
}

// ============================================================================
// Message framing
// ============================================================================

/// Maximum message size (8MB). Item payloads with long changelogs are large.
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

fn too_large(len: usize) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("message too large: {} bytes (max {})", len, MAX_MESSAGE_SIZE),
    )
}

/// Encode a message into one length-prefixed frame.
///
/// Fails without touching any stream when the message cannot be serialized
/// or exceeds [`MAX_MESSAGE_SIZE`].
pub fn encode_frame<T: Serialize>(message: &T) -> std::io::Result<Vec<u8>> {
    let json = serde_json::to_vec(message)
        .map_err(|e| std::io::Error::other(format!("serialize error: {}", e)))?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(too_large(json.len()));
    }
    let mut frame = Vec::with_capacity(json.len() + 4);
    frame.extend_from_slice(&(json.len() as u32).to_be_bytes());
    frame.extend_from_slice(&json);
    Ok(frame)
}

/// Blocking message framing, used by the worker.
///
/// Messages are framed as:
/// - 4 bytes: message length (big-endian u32)
/// - N bytes: JSON-encoded message
pub mod framing {
    use std::io::{Read, Write};

    use serde::de::DeserializeOwned;
    use serde::Serialize;

    use super::{encode_frame, too_large, MAX_MESSAGE_SIZE};

    /// Write a serializable message to the given writer.
    pub fn write_message<W: Write, T: Serialize>(
        writer: &mut W,
        message: &T,
    ) -> std::io::Result<()> {
        writer.write_all(&encode_frame(message)?)?;
        writer.flush()
    }

    /// Read a deserializable message from the given reader.
    pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> std::io::Result<T> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(too_large(len));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;

        serde_json::from_slice(&buf).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("deserialize error: {}", e),
            )
        })
    }
}

/// Async message framing, used by the coordinator. Same wire format as
/// [`framing`].
pub mod framing_async {
    use serde::de::DeserializeOwned;
    use serde::Serialize;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    use super::{encode_frame, too_large, MAX_MESSAGE_SIZE};

    /// Write a serializable message to the given writer.
    pub async fn write_message<W, T>(writer: &mut W, message: &T) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
        T: Serialize,
    {
        writer.write_all(&encode_frame(message)?).await?;
        writer.flush().await
    }

    /// Read a deserializable message from the given reader.
    pub async fn read_message<R, T>(reader: &mut R) -> std::io::Result<T>
    where
        R: AsyncRead + Unpin,
        T: DeserializeOwned,
    {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(too_large(len));
        }

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;

        serde_json::from_slice(&buf).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("deserialize error: {}", e),
            )
        })
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
