// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::unwrap_used)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// An isolated config + state directory.
pub struct Env {
    pub dir: TempDir,
}

impl Env {
    /// Config with no source and a worker binary that does not exist.
    pub fn new() -> Self {
        Self::with_source("")
    }

    pub fn with_source(url: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let env = Env { dir };
        let body = format!(
            "state_dir = \"{}\"\n\n[source]\nurl = \"{}\"\n\n[worker]\nhandshake_attempts = 2\nhandshake_interval_ms = 10\nbinary = \"{}\"\n",
            env.state_dir().display(),
            url,
            env.dir.path().join("no-such-trawld").display(),
        );
        std::fs::write(env.config_path(), body).unwrap();
        env
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// `trawl` pointed at this environment, with ambient overrides removed.
    pub fn trawl(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("trawl");
        cmd.env("TRAWL_CONFIG", self.config_path())
            .env_remove("TRAWL_STATE_DIR")
            .env_remove("TRAWL_API_TOKEN")
            .env_remove("TRAWL_WORKER_BINARY")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn settings(&self) -> serde_json::Value {
        let path = self.state_dir().join("settings.json");
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap(),
            Err(_) => serde_json::Value::Null,
        }
    }
}

/// Serve `bodies` as JSON 200 responses, one per connection, then stop.
/// Returns the base URL.
pub fn serve_json(bodies: Vec<String>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    std::thread::spawn(move || {
        for body in bodies {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut head = Vec::new();
            let mut byte = [0u8; 1];
            while !head.ends_with(b"\r\n\r\n") {
                match stream.read(&mut byte) {
                    Ok(1) => head.push(byte[0]),
                    _ => break,
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    url
}

/// Discover `keys` from a one-shot fake tracker and enable them.
pub fn env_with_targets(keys: &[&str]) -> Env {
    let projects: Vec<serde_json::Value> = keys
        .iter()
        .map(|k| serde_json::json!({ "id": k, "key": k }))
        .collect();
    let url = serve_json(vec![serde_json::Value::Array(projects).to_string()]);
    let env = Env::with_source(&url);
    env.trawl().args(["targets", "discover"]).assert().success();
    let mut enable = vec!["targets", "enable"];
    enable.extend_from_slice(keys);
    env.trawl().args(&enable).assert().success();
    env
}
