// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of syncable targets.
//!
//! Targets are added when discovered from the source and are never removed.
//! Registry order is the order `sync_all` visits targets in.

use std::sync::Arc;

use serde_json::Value;
use trawl_core::SyncTarget;

use crate::error::{Error, Result};
use crate::settings::Settings;

const TARGETS_KEY: &str = "targets";

/// Outcome of merging a discovery listing into the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: Vec<String>,
    pub total: usize,
}

#[derive(Clone)]
pub struct TargetRegistry {
    settings: Arc<Settings>,
}

impl TargetRegistry {
    pub fn new(settings: Arc<Settings>) -> Self {
        TargetRegistry { settings }
    }

    /// All known targets in registry order.
    pub fn list(&self) -> Result<Vec<SyncTarget>> {
        Ok(self
            .settings
            .get::<Vec<SyncTarget>>(TARGETS_KEY)?
            .unwrap_or_default())
    }

    /// Enabled targets in registry order.
    pub fn enabled(&self) -> Result<Vec<SyncTarget>> {
        Ok(self.list()?.into_iter().filter(|t| t.enabled).collect())
    }

    pub fn find(&self, id: &str) -> Result<Option<SyncTarget>> {
        Ok(self.list()?.into_iter().find(|t| t.id == id))
    }

    /// Merge targets reported by the source.
    ///
    /// New ids are appended disabled. Known ids keep their `enabled` flag but
    /// pick up a changed display name. Ids missing from the listing stay.
    pub fn merge_discovered(&self, discovered: &[SyncTarget]) -> Result<MergeSummary> {
        let mut summary = MergeSummary::default();
        let mut failure = None;

        self.settings.update(|map| {
            let mut targets = match decode(map.get(TARGETS_KEY)) {
                Ok(t) => t,
                Err(e) => {
                    failure = Some(e);
                    return false;
                }
            };

            let mut changed = false;
            for found in discovered {
                match targets.iter_mut().find(|t| t.id == found.id) {
                    Some(existing) => {
                        if found.name.is_some() && existing.name != found.name {
                            existing.name = found.name.clone();
                            changed = true;
                        }
                    }
                    None => {
                        targets.push(SyncTarget::discovered(found.id.clone(), found.name.clone()));
                        summary.added.push(found.id.clone());
                        changed = true;
                    }
                }
            }
            summary.total = targets.len();

            if changed {
                match serde_json::to_value(&targets) {
                    Ok(v) => {
                        map.insert(TARGETS_KEY.to_string(), v);
                    }
                    Err(e) => {
                        failure = Some(e.into());
                        return false;
                    }
                }
            }
            changed
        })?;

        match failure {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Enable or disable a known target.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut failure = None;

        self.settings.update(|map| {
            let mut targets = match decode(map.get(TARGETS_KEY)) {
                Ok(t) => t,
                Err(e) => {
                    failure = Some(e);
                    return false;
                }
            };
            let Some(target) = targets.iter_mut().find(|t| t.id == id) else {
                failure = Some(Error::TargetNotFound(id.to_string()));
                return false;
            };
            if target.enabled == enabled {
                return false;
            }
            target.enabled = enabled;
            match serde_json::to_value(&targets) {
                Ok(v) => {
                    map.insert(TARGETS_KEY.to_string(), v);
                    true
                }
                Err(e) => {
                    failure = Some(e.into());
                    false
                }
            }
        })?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn decode(value: Option<&Value>) -> Result<Vec<SyncTarget>> {
    match value {
        Some(v) => Ok(serde_json::from_value(v.clone())?),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
#[path = "targets_tests.rs"]
mod tests;
