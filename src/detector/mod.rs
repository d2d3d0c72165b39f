//! Change-set detection against a persisted baseline of entity names.
//!
//! Each run compares the freshly fetched entities with the names stored at the
//! baseline path, reports the additions, and overwrites the baseline with the
//! current snapshot. With [`PersistOrder::BeforeNotify`] the overwrite happens
//! inside [`ChangeSetDetector::detect`], so a retried run never re-reports an
//! addition even if its notification was lost.

pub mod baseline;


use crate::error::DetectorError;
use baseline::{AuditRecord, audit_path, load_baseline, save_baseline, write_audit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// A tracked item. Identity is the `name` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            url: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// When the new baseline is written relative to caller side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistOrder {
    /// Write during `detect`: no duplicate notifications, possible silent miss on crash.
    #[default]
    BeforeNotify,
    /// Write on `commit` after notifying: no silent miss, possible duplicate on crash.
    AfterNotify,
}

#[derive(Debug)]
pub enum Detection {
    /// No baseline existed; it was seeded and nothing should be notified.
    Bootstrap { seeded: usize },
    Changes(ChangeSet),
}

#[derive(Debug)]
pub struct ChangeSet {
    /// Additions in name order.
    pub added: Vec<Entity>,
    pub prior: BTreeSet<String>,
    pub audit_path: Option<PathBuf>,
    pending: Option<BTreeSet<String>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
    }

    pub fn added_names(&self) -> BTreeSet<String> {
        self.added.iter().map(|e| e.name.clone()).collect()
    }

    /// True while a deferred baseline write is still owed.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

pub struct ChangeSetDetector {
    baseline_path: PathBuf,
    order: PersistOrder,
    audit: bool,
}

impl ChangeSetDetector {
    pub fn new(baseline_path: impl Into<PathBuf>) -> Self {
        Self {
            baseline_path: baseline_path.into(),
            order: PersistOrder::default(),
            audit: true,
        }
    }

    #[must_use]
    pub fn with_persist_order(mut self, order: PersistOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: bool) -> Self {
        self.audit = audit;
        self
    }

    pub fn baseline_path(&self) -> &Path {
        &self.baseline_path
    }

    pub fn detect(&self, current: &[Entity]) -> Result<Detection, DetectorError> {
        self.detect_at(current, Utc::now())
    }

    /// `detect` with an explicit run timestamp for the audit artifact.
    pub fn detect_at(
        &self,
        current: &[Entity],
        now: DateTime<Utc>,
    ) -> Result<Detection, DetectorError> {
        let current = unique_by_name(current);
        let names: BTreeSet<String> = current.keys().cloned().collect();

        let Some(prior) = load_baseline(&self.baseline_path) else {
            save_baseline(&self.baseline_path, &names)?;
            tracing::info!(
                path = %self.baseline_path.display(),
                seeded = names.len(),
                "no baseline found, seeded from current snapshot"
            );
            return Ok(Detection::Bootstrap {
                seeded: names.len(),
            });
        };

        let added: Vec<Entity> = current
            .into_iter()
            .filter(|(name, _)| !prior.contains(name))
            .map(|(_, entity)| entity.clone())
            .collect();

        let pending = match self.order {
            PersistOrder::BeforeNotify => {
                save_baseline(&self.baseline_path, &names)?;
                None
            }
            PersistOrder::AfterNotify => Some(names),
        };

        let audit_path = if self.audit && !added.is_empty() {
            self.write_audit(&added, now)
        } else {
            None
        };

        tracing::info!(added = added.len(), prior = prior.len(), "change set computed");
        Ok(Detection::Changes(ChangeSet {
            added,
            prior,
            audit_path,
            pending,
        }))
    }

    /// Compute additions without touching the filesystem.
    pub fn preview(&self, current: &[Entity]) -> Detection {
        let current = unique_by_name(current);
        match load_baseline(&self.baseline_path) {
            None => Detection::Bootstrap {
                seeded: current.len(),
            },
            Some(prior) => {
                let added = current
                    .into_iter()
                    .filter(|(name, _)| !prior.contains(name))
                    .map(|(_, entity)| entity.clone())
                    .collect();
                Detection::Changes(ChangeSet {
                    added,
                    prior,
                    audit_path: None,
                    pending: None,
                })
            }
        }
    }

    /// Write a deferred baseline. No-op when it was already persisted in `detect`.
    pub fn commit(&self, change_set: &mut ChangeSet) -> Result<(), DetectorError> {
        if let Some(names) = change_set.pending.take() {
            save_baseline(&self.baseline_path, &names)?;
            tracing::info!(path = %self.baseline_path.display(), "deferred baseline committed");
        }
        Ok(())
    }

    fn write_audit(&self, added: &[Entity], now: DateTime<Utc>) -> Option<PathBuf> {
        let path = audit_path(&self.baseline_path, now);
        let records: Vec<AuditRecord<'_>> = added
            .iter()
            .map(|e| AuditRecord {
                name: &e.name,
                description: e.description.as_deref(),
            })
            .collect();

        match write_audit(&path, &records) {
            Ok(()) => Some(path),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "failed to write audit artifact");
                None
            }
        }
    }
}

/// First occurrence wins when a snapshot repeats a name.
fn unique_by_name(entities: &[Entity]) -> BTreeMap<String, &Entity> {
    let mut unique = BTreeMap::new();
    for entity in entities {
        unique.entry(entity.name.clone()).or_insert(entity);
    }
    unique
}
