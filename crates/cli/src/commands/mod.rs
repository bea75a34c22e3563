// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod browse;
pub mod config;
pub mod status;
pub mod sync;
pub mod targets;
pub mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::checkpoint::SettingsCheckpoints;
use crate::config::{default_config_path, Config};
use crate::error::{Error, Result};
use crate::proxy::{Handshake, SocketWorker, StorageProxy};
use crate::settings::Settings;
use crate::source::JiraSource;
use crate::sync::{SyncOptions, SyncOrchestrator};
use crate::targets::TargetRegistry;

/// Everything a command needs, resolved from config and environment.
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    pub state_dir: PathBuf,
    settings: Arc<Settings>,
}

impl Context {
    /// Load config from `path`, or from the default location.
    ///
    /// An explicit path must exist; the default location may be absent.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let (mut config, config_path) = match path {
            Some(path) => (Config::load(&path)?, path),
            None => {
                let path = default_config_path();
                (Config::load_or_default(&path)?, path)
            }
        };
        config.apply_env();
        Ok(Self::new(config, config_path))
    }

    pub fn new(config: Config, config_path: PathBuf) -> Self {
        let state_dir = config.state_dir();
        let settings = Arc::new(Settings::in_state_dir(&state_dir));
        Context {
            config,
            config_path,
            state_dir,
            settings,
        }
    }

    pub fn targets(&self) -> TargetRegistry {
        TargetRegistry::new(Arc::clone(&self.settings))
    }

    pub fn checkpoints(&self) -> SettingsCheckpoints {
        SettingsCheckpoints::new(Arc::clone(&self.settings))
    }

    /// The configured tracker client.
    pub fn source(&self) -> Result<JiraSource> {
        if !self.config.has_source() {
            return Err(Error::SourceNotConfigured(
                self.config_path.display().to_string(),
            ));
        }
        Ok(JiraSource::from_config(&self.config.source)?)
    }

    /// A proxy to the worker for this state directory. Nothing is spawned
    /// until the first call.
    pub fn storage(&self) -> Arc<StorageProxy> {
        let worker = &self.config.worker;
        let backend = SocketWorker::new(
            self.state_dir.clone(),
            worker.binary.clone(),
            worker.request_timeout(),
        );
        Arc::new(StorageProxy::new(
            Arc::new(backend),
            Handshake {
                attempts: worker.handshake_attempts,
                interval: worker.handshake_interval(),
            },
        ))
    }

    pub fn orchestrator(&self) -> Result<Arc<SyncOrchestrator>> {
        let source = self.source()?;
        Ok(Arc::new(SyncOrchestrator::new(
            Arc::new(source),
            self.storage(),
            Arc::new(self.checkpoints()),
            self.targets(),
            SyncOptions::from(&self.config),
        )))
    }
}

/// Format a timestamp for text output.
pub(crate) fn format_time(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Pluralize `noun` for `count`.
pub(crate) fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Print a value as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
