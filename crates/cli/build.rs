// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::env::var("OUT_DIR")?;
    let path = std::path::Path::new(&out_dir).join("env_vars.rs");
    let mut f = std::fs::File::create(path)?;

    let vars = [
        ("TRAWL_STATE_DIR", "TRAWL_STATE_DIR"),
        ("TRAWL_CONFIG", "TRAWL_CONFIG"),
        ("TRAWL_API_TOKEN", "TRAWL_API_TOKEN"),
        ("TRAWL_WORKER_BINARY", "TRAWL_WORKER_BINARY"),
        ("XDG_STATE_HOME", "XDG_STATE_HOME"),
        ("XDG_CONFIG_HOME", "XDG_CONFIG_HOME"),
    ];

    for (const_name, env_name) in &vars {
        writeln!(f, "pub const {const_name}: &str = \"{env_name}\";")?;
    }

    Ok(())
}
