// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process management: spawn, detect, stop, cleanup.
//!
//! The worker (`trawld`) runs in the background and listens on a Unix socket.
//! Socket, PID, lock, and log files live in the state directory.

use std::fs;
use std::io::{BufRead, BufReader};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use trawl_ipc::{framing, Action, ProxyRequest, ProxyResponse, WorkerStatus, PING_SENTINEL};

use crate::env;
use crate::error::{Error, Result};

const SOCKET_NAME: &str = "worker.sock";
const PID_NAME: &str = "worker.pid";
const LOG_NAME: &str = "worker.log";
const WORKER_BINARY_NAME: &str = "trawld";

/// Polls after READY before giving up on the socket.
const SPAWN_POLL_ATTEMPTS: u32 = 150;
const SPAWN_POLL_INTERVAL: Duration = Duration::from_millis(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A running worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub pid: u32,
}

pub fn socket_path(state_dir: &Path) -> PathBuf {
    state_dir.join(SOCKET_NAME)
}

pub fn pid_path(state_dir: &Path) -> PathBuf {
    state_dir.join(PID_NAME)
}

pub fn log_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOG_NAME)
}

/// Send one request over a fresh connection.
fn exchange(state_dir: &Path, request: &ProxyRequest, timeout: Duration) -> std::io::Result<ProxyResponse> {
    let mut stream = UnixStream::connect(socket_path(state_dir))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    framing::write_message(&mut stream, request)?;
    framing::read_message(&mut stream)
}

/// Detect a live worker for the state directory.
///
/// Returns `None` when nothing answers, removing stale socket and PID files.
pub fn detect_worker(state_dir: &Path) -> Result<Option<WorkerInfo>> {
    let socket = socket_path(state_dir);
    let pid_file = pid_path(state_dir);

    if !socket.exists() {
        if pid_file.exists() {
            let _ = fs::remove_file(&pid_file);
        }
        return Ok(None);
    }

    match exchange(state_dir, &ProxyRequest::bare(Action::Ping, 0), PROBE_TIMEOUT) {
        Ok(response)
            if response.success
                && response.data.as_ref().and_then(|d| d.as_str()) == Some(PING_SENTINEL) =>
        {
            // PID file missing means the worker is still starting up
            Ok(read_pid_file(&pid_file)
                .filter(|pid| *pid > 0)
                .map(|pid| WorkerInfo { pid }))
        }
        _ => {
            cleanup_stale_files(state_dir);
            Ok(None)
        }
    }
}

/// Query a running worker for its status.
pub fn worker_status(state_dir: &Path) -> Result<Option<WorkerStatus>> {
    if !socket_path(state_dir).exists() {
        return Ok(None);
    }

    let response = match exchange(
        state_dir,
        &ProxyRequest::bare(Action::Status, 0),
        Duration::from_secs(5),
    ) {
        Ok(response) => response,
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
            cleanup_stale_files(state_dir);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if !response.success {
        return Err(Error::Worker(
            response
                .error
                .unwrap_or_else(|| "status request failed".to_string()),
        ));
    }
    Ok(Some(response.decode_data()?))
}

fn stop_worker(state_dir: &Path) -> Result<()> {
    if !socket_path(state_dir).exists() {
        return Err(Error::Worker("worker is not running".to_string()));
    }
    let response = exchange(
        state_dir,
        &ProxyRequest::bare(Action::Shutdown, 0),
        PROBE_TIMEOUT,
    )?;
    if response.success {
        Ok(())
    } else {
        Err(Error::Worker(
            response
                .error
                .unwrap_or_else(|| "shutdown refused".to_string()),
        ))
    }
}

/// Locate the worker binary: configured path, `TRAWL_WORKER_BINARY`,
/// next to the current executable, then `PATH`.
pub fn find_worker_binary(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    if let Some(path) = env::worker_binary() {
        return path;
    }
    if let Ok(exe) = std::env::current_exe() {
        let sibling = exe.with_file_name(WORKER_BINARY_NAME);
        if sibling.exists() {
            return sibling;
        }
    }
    PathBuf::from(WORKER_BINARY_NAME)
}

/// Start a worker for the state directory, or return the one already running.
pub fn spawn_worker(state_dir: &Path, binary: Option<&Path>) -> Result<WorkerInfo> {
    if let Some(info) = detect_worker(state_dir)? {
        return Ok(info);
    }

    fs::create_dir_all(state_dir)?;
    let binary = find_worker_binary(binary);

    let mut child = Command::new(&binary)
        .arg("--state-dir")
        .arg(state_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            Error::Worker(format!(
                "failed to start {} ({}): {}",
                WORKER_BINARY_NAME,
                binary.display(),
                e
            ))
        })?;

    // The worker prints READY once its socket is bound
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) if line == "READY" => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }

    for _ in 0..SPAWN_POLL_ATTEMPTS {
        if let Ok(Some(status)) = child.try_wait() {
            let mut output = String::new();
            if let Some(mut stderr) = child.stderr.take() {
                use std::io::Read;
                let _ = stderr.read_to_string(&mut output);
            }
            return Err(Error::Worker(format!(
                "worker exited with status: {}\n{}",
                status,
                output.trim()
            )));
        }

        if let Some(info) = detect_worker(state_dir)? {
            tracing::debug!(pid = info.pid, "worker spawned");
            return Ok(info);
        }
        std::thread::sleep(SPAWN_POLL_INTERVAL);
    }

    Err(Error::Worker(
        "worker failed to start: socket never answered".to_string(),
    ))
}

/// Stop the worker, escalating to SIGKILL if it does not shut down cleanly.
///
/// Returns whether a worker appeared to be running.
pub fn stop_worker_forcefully(state_dir: &Path) -> Result<bool> {
    let pid = read_pid_file(&pid_path(state_dir));
    let had_socket = socket_path(state_dir).exists();

    if stop_worker(state_dir).is_ok() {
        if let Some(pid) = pid {
            wait_for_exit(pid, Duration::from_secs(1));
        }
        cleanup_stale_files(state_dir);
        return Ok(true);
    }

    if let Some(pid) = pid {
        tracing::warn!(pid, "worker did not shut down, killing");
        let _ = Command::new("kill").arg("-9").arg(pid.to_string()).output();
        std::thread::sleep(Duration::from_millis(100));
    }
    cleanup_stale_files(state_dir);
    Ok(had_socket || pid.is_some())
}

fn wait_for_exit(pid: u32, timeout: Duration) {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        match Command::new("kill").arg("-0").arg(pid.to_string()).output() {
            Ok(output) if !output.status.success() => return,
            Err(_) => return,
            _ => {}
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn cleanup_stale_files(state_dir: &Path) {
    let _ = fs::remove_file(socket_path(state_dir));
    let _ = fs::remove_file(pid_path(state_dir));
}

fn read_pid_file(path: &Path) -> Option<u32> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}
