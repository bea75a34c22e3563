// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn token_is_masked() {
    let mut config = Config::default();
    config.source.url = "https://tracker.example.com".to_string();
    config.source.token = Some("s3cret".to_string());

    let text = render(&config).unwrap();

    assert!(!text.contains("s3cret"));
    assert!(text.contains(MASK));
    assert!(text.contains("https://tracker.example.com"));
}

#[test]
fn state_dir_is_resolved() {
    let config = Config {
        state_dir: Some("/var/lib/trawl".into()),
        ..Config::default()
    };
    let text = render(&config).unwrap();
    assert!(text.contains("state_dir = \"/var/lib/trawl\""));
}

#[test]
fn rendered_config_parses_back() {
    let config = Config::default();
    let parsed: Config = toml::from_str(&render(&config).unwrap()).unwrap();
    assert_eq!(parsed.source.page_size, config.source.page_size);
    assert_eq!(parsed.worker.handshake_attempts, config.worker.handshake_attempts);
    assert!(parsed.state_dir.is_some());
}
