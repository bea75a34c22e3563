// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint persistence.
//!
//! A checkpoint exists for a target exactly while its most recent run is
//! unfinished. The sync orchestrator is the only writer.

use std::sync::Arc;

use trawl_core::Checkpoint;

use crate::error::{Error, Result};
use crate::settings::Settings;

const KEY_PREFIX: &str = "checkpoint.";

/// Durable resume state, one record per target.
pub trait CheckpointStore: Send + Sync {
    fn get(&self, target_id: &str) -> Result<Option<Checkpoint>>;
    fn put(&self, target_id: &str, checkpoint: &Checkpoint) -> Result<()>;
    fn clear(&self, target_id: &str) -> Result<()>;
}

fn key(target_id: &str) -> String {
    format!("{KEY_PREFIX}{target_id}")
}

fn checkpoint_error(target_id: &str, e: Error) -> Error {
    Error::Checkpoint(format!("{target_id}: {e}"))
}

/// Checkpoints kept in the settings file under `checkpoint.<target>`.
#[derive(Clone)]
pub struct SettingsCheckpoints {
    settings: Arc<Settings>,
}

impl SettingsCheckpoints {
    pub fn new(settings: Arc<Settings>) -> Self {
        SettingsCheckpoints { settings }
    }

    /// Target ids that currently have a checkpoint.
    pub fn pending_targets(&self) -> Result<Vec<String>> {
        Ok(self
            .settings
            .keys_with_prefix(KEY_PREFIX)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(KEY_PREFIX).map(str::to_string))
            .collect())
    }
}

impl CheckpointStore for SettingsCheckpoints {
    fn get(&self, target_id: &str) -> Result<Option<Checkpoint>> {
        self.settings
            .get(&key(target_id))
            .map_err(|e| checkpoint_error(target_id, e))
    }

    fn put(&self, target_id: &str, checkpoint: &Checkpoint) -> Result<()> {
        self.settings
            .put(&key(target_id), checkpoint)
            .map_err(|e| checkpoint_error(target_id, e))
    }

    fn clear(&self, target_id: &str) -> Result<()> {
        self.settings
            .remove(&key(target_id))
            .map(|_| ())
            .map_err(|e| checkpoint_error(target_id, e))
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
