// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! User configuration.
//!
//! Configuration is stored in `$XDG_CONFIG_HOME/trawl/config.toml` and includes:
//! - `[source]`: tracker URL, credentials, and page size
//! - `[sync]`: incremental mode and the watermark safety margin
//! - `[worker]`: storage worker handshake and request timeouts
//! - `state_dir`: where the database, settings, and worker files live

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env;
use crate::error::{Error, Result};

const APP_DIR_NAME: &str = "trawl";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overrides the default state directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    pub source: SourceConfig,
    pub sync: SyncConfig,
    pub worker: WorkerConfig,
}

/// Remote tracker connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the tracker (e.g. `https://example.atlassian.net`).
    pub url: String,
    /// Username for basic auth. Without it the token is sent as a bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// API token. `TRAWL_API_TOKEN` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Items requested per page.
    pub page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            url: String::new(),
            user: None,
            token: None,
            page_size: 50,
            request_timeout_secs: 30,
        }
    }
}

/// Sync behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Fetch only items updated since the stored watermark (minus the margin).
    pub incremental: bool,
    /// Seconds subtracted from the watermark to tolerate clock skew and late writes.
    pub safety_margin_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            incremental: true,
            safety_margin_secs: 300,
        }
    }
}

/// Storage worker lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Liveness probes sent after spawning the worker.
    pub handshake_attempts: u32,
    /// Delay between liveness probes.
    pub handshake_interval_ms: u64,
    /// Timeout for a single request round trip.
    pub request_timeout_secs: u64,
    /// Path to the `trawld` binary. `TRAWL_WORKER_BINARY` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            handshake_attempts: 50,
            handshake_interval_ms: 100,
            request_timeout_secs: 30,
            binary: None,
        }
    }
}

impl WorkerConfig {
    pub fn handshake_interval(&self) -> Duration {
        Duration::from_millis(self.handshake_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Largest accepted `sync.safety_margin_secs` (one year).
pub const MAX_SAFETY_MARGIN_SECS: u64 = 366 * 24 * 60 * 60;

impl SyncConfig {
    /// The margin as a duration, clamped to [`MAX_SAFETY_MARGIN_SECS`].
    pub fn safety_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.safety_margin_secs.min(MAX_SAFETY_MARGIN_SECS) as i64)
    }
}

impl Config {
    /// Loads configuration from the given file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Saves configuration to the given file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Rejects values that would make sync or the worker handshake impossible.
    pub fn validate(&self) -> Result<()> {
        if self.source.page_size == 0 {
            return Err(Error::Config(
                "source.page_size must be at least 1".to_string(),
            ));
        }
        if self.sync.safety_margin_secs > MAX_SAFETY_MARGIN_SECS {
            return Err(Error::Config(format!(
                "sync.safety_margin_secs must be at most {}",
                MAX_SAFETY_MARGIN_SECS
            )));
        }
        if self.worker.handshake_attempts == 0 {
            return Err(Error::Config(
                "worker.handshake_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(token) = env::api_token() {
            self.source.token = Some(token);
        }
        if let Some(binary) = env::worker_binary() {
            self.worker.binary = Some(binary);
        }
        if let Some(dir) = env::state_dir() {
            self.state_dir = Some(dir);
        }
    }

    /// The state directory: configured value, else the XDG state directory.
    pub fn state_dir(&self) -> PathBuf {
        match &self.state_dir {
            Some(dir) => dir.clone(),
            None => default_state_dir(),
        }
    }

    /// Whether a source URL has been configured.
    pub fn has_source(&self) -> bool {
        !self.source.url.trim().is_empty()
    }
}

/// Default config file location (`TRAWL_CONFIG`, else XDG config dir).
pub fn default_config_path() -> PathBuf {
    if let Some(path) = env::config_path() {
        return path;
    }
    let base = env::xdg_config_home()
        .or_else(dirs::config_dir)
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Default state directory (`$XDG_STATE_HOME/trawl`, else `~/.local/state/trawl`).
pub fn default_state_dir() -> PathBuf {
    if let Some(dir) = env::xdg_state_home() {
        return dir.join(APP_DIR_NAME);
    }
    dirs::home_dir()
        .map(|h| h.join(".local/state").join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".local/state").join(APP_DIR_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
