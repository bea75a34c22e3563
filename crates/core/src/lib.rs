// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! trawl-core: Shared library for the trawl issue mirror
//!
//! This crate provides the item model, sync targets and checkpoints, and the
//! SQLite storage engine used by both the trawl CLI and the trawld worker.

pub mod db;
pub mod error;
pub mod item;
pub mod run;
pub mod target;

pub use db::{Store, UpsertOutcome};
pub use error::{Error, Result};
pub use item::{
    format_timestamp, parse_timestamp, HistoryEntry, ItemFields, ItemQuery, ItemRecord,
    RemoteItem,
};
pub use run::{RunStatus, SyncRun};
pub use target::{Checkpoint, SyncTarget};
