// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! trawld - The trawl storage worker.
//!
//! Exclusively owns the SQLite mirror database at `<state-dir>/trawl.db` and
//! serves storage proxy requests from the `trawl` coordinator over a Unix
//! socket, one request per connection. Each connection gets its own thread;
//! requests reach the database one at a time.
//!
//! Usage:
//!   trawld --state-dir <path> [--db <path>]

use std::fs;
use std::io::Write;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod env;
mod handler;

use handler::Handler;
use trawl_ipc::{framing, Action, ProxyRequest, ProxyResponse};

/// Socket filename within the state directory.
const SOCKET_NAME: &str = "worker.sock";
/// PID filename within the state directory.
const PID_NAME: &str = "worker.pid";
/// Lock filename for single instance guarantee.
const LOCK_NAME: &str = "worker.lock";
/// Log filename within the state directory.
const LOG_NAME: &str = "worker.log";
/// Database filename within the state directory.
const DB_NAME: &str = "trawl.db";

/// Per-connection IO timeout.
const IO_TIMEOUT: Duration = Duration::from_secs(30);

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let state_dir = parse_state_dir(&args);
    let db_path = parse_flag(&args, "--db")
        .map(PathBuf::from)
        .unwrap_or_else(|| state_dir.join(DB_NAME));

    if let Err(e) = fs::create_dir_all(&state_dir) {
        eprintln!("failed to create state dir {}: {}", state_dir.display(), e);
        std::process::exit(1);
    }

    setup_logging(&state_dir.join(LOG_NAME));

    tracing::info!("trawld starting, state_dir={}", state_dir.display());

    let lock_path = state_dir.join(LOCK_NAME);
    let lock_file = match acquire_lock(&lock_path) {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("failed to acquire lock: {}", e);
            std::process::exit(1);
        }
    };

    let pid_path = state_dir.join(PID_NAME);
    if let Err(e) = fs::write(&pid_path, std::process::id().to_string()) {
        tracing::error!("failed to write PID file: {}", e);
        std::process::exit(1);
    }

    // Holding the lock means any existing socket is stale
    let socket_path = state_dir.join(SOCKET_NAME);
    let _ = fs::remove_file(&socket_path);

    let listener = match UnixListener::bind(&socket_path) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("failed to bind socket: {}", e);
            cleanup(&pid_path, &socket_path);
            std::process::exit(1);
        }
    };

    tracing::info!("listening on {}", socket_path.display());

    println!("READY");
    let _ = std::io::stdout().flush();

    let handler = Arc::new(Mutex::new(Handler::new(db_path)));
    serve(&listener, &socket_path, &handler);

    lock(&handler).flush();
    cleanup(&pid_path, &socket_path);
    drop(lock_file);
    tracing::info!("trawld stopped");
}

fn lock(handler: &Mutex<Handler>) -> std::sync::MutexGuard<'_, Handler> {
    handler.lock().unwrap_or_else(|e| e.into_inner())
}

/// Accept connections until a `SHUTDOWN` request has been answered.
///
/// A slow or silent client only ties up its own thread.
fn serve(listener: &UnixListener, socket_path: &Path, handler: &Arc<Mutex<Handler>>) {
    let stopping = Arc::new(AtomicBool::new(false));

    for stream in listener.incoming() {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        match stream {
            Ok(stream) => {
                let handler = Arc::clone(handler);
                let stopping = Arc::clone(&stopping);
                let socket_path = socket_path.to_path_buf();
                std::thread::spawn(move || {
                    if serve_connection(stream, &handler) {
                        tracing::info!("shutting down");
                        stopping.store(true, Ordering::SeqCst);
                        // Wake the acceptor so it sees the flag.
                        let _ = UnixStream::connect(&socket_path);
                    }
                });
            }
            Err(e) => {
                tracing::warn!("failed to accept connection: {}", e);
            }
        }
    }
}

/// Serve one request. Returns true when the worker should shut down.
fn serve_connection(mut stream: UnixStream, handler: &Mutex<Handler>) -> bool {
    let _ = stream.set_read_timeout(Some(IO_TIMEOUT));
    let _ = stream.set_write_timeout(Some(IO_TIMEOUT));

    let request: ProxyRequest = match framing::read_message(&mut stream) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("failed to read request: {}", e);
            if e.kind() == std::io::ErrorKind::InvalidData {
                let response = ProxyResponse::err(0, format!("malformed request: {}", e));
                let _ = framing::write_message(&mut stream, &response);
            }
            return false;
        }
    };

    let response = lock(handler).handle(&request);
    let shutdown = response.success && request.action().ok() == Some(Action::Shutdown);

    if let Err(e) = framing::write_message(&mut stream, &response) {
        tracing::warn!(
            request_id = request.request_id,
            "failed to write response: {}",
            e
        );
    }
    shutdown
}

fn parse_flag<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parse_state_dir(args: &[String]) -> PathBuf {
    if let Some(dir) = parse_flag(args, "--state-dir") {
        return PathBuf::from(dir);
    }
    if let Some(dir) = env::state_dir() {
        return dir;
    }
    if let Some(dir) = env::xdg_state_home() {
        return dir.join("trawl");
    }
    dirs::home_dir()
        .map(|h| h.join(".local/state/trawl"))
        .unwrap_or_else(|| PathBuf::from(".local/state/trawl"))
}

fn setup_logging(log_path: &Path) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Ok(file) = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn acquire_lock(lock_path: &Path) -> std::io::Result<fs::File> {
    use fs2::FileExt;

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(lock_path)?;
    file.try_lock_exclusive()
        .map_err(|_| std::io::Error::other("another worker instance is already running"))?;
    Ok(file)
}

fn cleanup(pid_path: &Path, socket_path: &Path) {
    let _ = fs::remove_file(pid_path);
    let _ = fs::remove_file(socket_path);
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
