// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync targets and their resume checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One syncable collection on the source (e.g. a project key).
///
/// Targets are discovered from the source and only ever disabled, never
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    /// Stable identifier on the source.
    pub id: String,
    /// Display name, if the source reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub enabled: bool,
}

impl SyncTarget {
    /// A newly discovered target. Targets start disabled.
    pub fn discovered(id: impl Into<String>, name: Option<String>) -> Self {
        SyncTarget {
            id: id.into(),
            name,
            enabled: false,
        }
    }

    /// An enabled target, mostly useful for configuration and tests.
    pub fn enabled(id: impl Into<String>) -> Self {
        SyncTarget {
            id: id.into(),
            name: None,
            enabled: true,
        }
    }
}

/// Resume state for an interrupted sync of one target.
///
/// A checkpoint exists for a target exactly when its most recent run did not
/// complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// `updated_at` of the last item of the last fully applied batch.
    pub last_processed_updated_at: DateTime<Utc>,
    /// Offset into the result set where the next run resumes.
    pub start_position: u64,
    /// Total reported by the source at checkpoint time. Advisory only.
    pub total_at_checkpoint: u64,
    /// Lower bound of the query that produced `start_position`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_since: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Fraction of the advisory total already processed, clamped to `[0, 1]`.
    pub fn progress_ratio(&self) -> f64 {
        if self.total_at_checkpoint == 0 {
            return 0.0;
        }
        (self.start_position as f64 / self.total_at_checkpoint as f64).min(1.0)
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
