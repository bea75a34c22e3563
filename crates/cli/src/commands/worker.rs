// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Storage worker management commands.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::proxy::lifecycle::{log_path, stop_worker_forcefully, worker_status};

use super::Context;

pub fn status(ctx: &Context) -> Result<()> {
    match worker_status(&ctx.state_dir) {
        Ok(Some(status)) => {
            println!("Status: running");
            println!("PID: {}", status.pid);
            println!("Uptime: {}s", status.uptime_secs);
            println!(
                "Database: {}",
                if status.initialized {
                    "open"
                } else {
                    "not opened yet"
                }
            );
        }
        Ok(None) => {
            println!("Status: not running");
            println!();
            println!("The worker starts on demand, or run 'trawl worker start'.");
        }
        Err(e) => {
            println!("Status: error checking worker");
            println!("Error: {}", e);
        }
    }
    println!("State dir: {}", ctx.state_dir.display());
    Ok(())
}

/// Start the worker through the proxy, so the handshake is the same one
/// sync uses.
pub async fn start(ctx: &Context) -> Result<()> {
    let storage = ctx.storage();
    storage.ensure_ready().await?;
    let status = storage.worker_status().await?;
    println!("Worker running (PID: {})", status.pid);
    Ok(())
}

pub fn stop(ctx: &Context) -> Result<()> {
    if stop_worker_forcefully(&ctx.state_dir)? {
        println!("Worker stopped.");
    } else {
        println!("Worker is not running.");
    }
    Ok(())
}

pub fn logs(ctx: &Context, lines: usize) -> Result<()> {
    let path = log_path(&ctx.state_dir);
    match tail(&path, lines)? {
        Some(text) => print!("{}", text),
        None => println!("No worker log at {}", path.display()),
    }
    Ok(())
}

/// Last `lines` lines of a file, or `None` if it does not exist.
pub(crate) fn tail(path: &Path, lines: usize) -> Result<Option<String>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);
    let mut out = all[start..].join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(Some(out))
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
