// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    running = { RunStatus::Running, "running" },
    completed = { RunStatus::Completed, "completed" },
    failed = { RunStatus::Failed, "failed" },
)]
fn run_status_round_trips_through_str(status: RunStatus, text: &str) {
    assert_eq!(status.as_str(), text);
    assert_eq!(status.to_string(), text);
    assert_eq!(text.parse::<RunStatus>().unwrap(), status);
}

#[test]
fn run_status_parse_is_case_insensitive() {
    assert_eq!("COMPLETED".parse::<RunStatus>().unwrap(), RunStatus::Completed);
}

#[test]
fn run_status_rejects_unknown() {
    let err = "paused".parse::<RunStatus>().unwrap_err();
    assert!(matches!(err, Error::InvalidRunStatus(_)));
}
