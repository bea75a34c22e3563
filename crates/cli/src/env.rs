// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! All runtime environment variables used by the CLI are defined here
//! with typed accessor functions. The variable name constants are generated
//! by `build.rs` and live in the [`vars`] submodule.

use std::path::PathBuf;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Returns the value of `TRAWL_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    non_empty(vars::TRAWL_STATE_DIR).map(PathBuf::from)
}

/// Returns the value of `TRAWL_CONFIG` if set.
pub fn config_path() -> Option<PathBuf> {
    non_empty(vars::TRAWL_CONFIG).map(PathBuf::from)
}

/// Returns the value of `TRAWL_API_TOKEN` if set.
pub fn api_token() -> Option<String> {
    non_empty(vars::TRAWL_API_TOKEN)
}

/// Returns the value of `TRAWL_WORKER_BINARY` if set.
pub fn worker_binary() -> Option<PathBuf> {
    non_empty(vars::TRAWL_WORKER_BINARY).map(PathBuf::from)
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    non_empty(vars::XDG_STATE_HOME).map(PathBuf::from)
}

/// Returns the value of `XDG_CONFIG_HOME` if set.
pub fn xdg_config_home() -> Option<PathBuf> {
    non_empty(vars::XDG_CONFIG_HOME).map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
