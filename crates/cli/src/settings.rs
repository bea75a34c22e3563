// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable key-value settings.
//!
//! Settings live in a single JSON object at `<state_dir>/settings.json`.
//! Every mutation is a read-modify-write under an exclusive file lock, and the
//! new document is written to a temp file, fsynced, and renamed into place so a
//! crash never leaves a half-written file behind.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

const SETTINGS_NAME: &str = "settings.json";
const LOCK_NAME: &str = "settings.lock";

/// Opaque key-value store backing checkpoints and the target registry.
pub struct Settings {
    path: PathBuf,
    lock_path: PathBuf,
    /// Serializes writers within this process; the file lock covers other processes.
    guard: Mutex<()>,
}

impl Settings {
    /// Settings stored in the given state directory.
    pub fn in_state_dir(state_dir: &Path) -> Self {
        Settings {
            path: state_dir.join(SETTINGS_NAME),
            lock_path: state_dir.join(LOCK_NAME),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a value. Missing keys and a missing file both yield `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let map = self.read_all()?;
        match map.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Store a value, replacing any previous one.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.update(|map| {
            map.insert(key.to_string(), value);
            true
        })
    }

    /// Remove a key. Returns whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut removed = false;
        self.update(|map| {
            removed = map.remove(key).is_some();
            removed
        })?;
        Ok(removed)
    }

    /// All keys starting with `prefix`, in sorted order.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let map = self.read_all()?;
        let mut keys: Vec<String> = map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Apply `mutate` to the current document and write it back if it reports a change.
    pub(crate) fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Map<String, Value>) -> bool,
    {
        let _guard = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        lock.lock_exclusive()?;

        let result = self.read_all().and_then(|mut map| {
            if mutate(&mut map) {
                self.write_all(&map)
            } else {
                Ok(())
            }
        });

        let _ = FileExt::unlock(&lock);
        result
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, map: &Map<String, Value>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, map)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
