// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variables read by the worker.

use std::path::PathBuf;

/// Environment variable names.
pub mod names {
    pub const TRAWL_STATE_DIR: &str = "TRAWL_STATE_DIR";
    pub const XDG_STATE_HOME: &str = "XDG_STATE_HOME";
}

/// Returns the value of `TRAWL_STATE_DIR` if set.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var(names::TRAWL_STATE_DIR).ok().map(PathBuf::from)
}

/// Returns the value of `XDG_STATE_HOME` if set.
pub fn xdg_state_home() -> Option<PathBuf> {
    std::env::var(names::XDG_STATE_HOME).ok().map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
