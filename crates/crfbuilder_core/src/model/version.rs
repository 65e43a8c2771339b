//! Named point-in-time snapshots of tree + library.
//!
//! # Invariants
//! - Versions are append-only, ordered by capture, and unique by id.
//! - A stored payload never changes; restore hands out a deep copy.
//! - Capture reads live state and never mutates it.

use crate::clock::now_epoch_ms;
use crate::model::error::{EntityKind, ModelError, ModelResult};
use crate::model::library::LibraryStore;
use crate::model::tree::ProjectTree;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Immutable snapshot of one project state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectVersion {
    pub id: String,
    pub label: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub tree: ProjectTree,
    pub library: LibraryStore,
}

/// Ordered sequence of captured versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStore {
    versions: Vec<ProjectVersion>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Versions in capture order.
    pub fn list(&self) -> &[ProjectVersion] {
        &self.versions
    }

    pub fn get(&self, version_id: &str) -> Option<&ProjectVersion> {
        self.versions.iter().find(|version| version.id == version_id)
    }

    /// Appends a snapshot of `tree` and `library` labelled `label`.
    ///
    /// # Errors
    /// - `InvalidOperation` when `label` is blank.
    pub fn capture(
        &self,
        label: impl Into<String>,
        tree: &ProjectTree,
        library: &LibraryStore,
    ) -> ModelResult<(Self, ProjectVersion)> {
        let label = label.into();
        let label = label.trim();
        if label.is_empty() {
            return Err(ModelError::invalid("version label must not be blank"));
        }

        let version = ProjectVersion {
            id: Uuid::new_v4().to_string(),
            label: label.to_string(),
            created_at: now_epoch_ms(),
            tree: tree.clone(),
            library: library.clone(),
        };
        let mut next = self.clone();
        next.versions.push(version.clone());
        Ok((next, version))
    }

    /// Returns a copy of the stored tree and library for `version_id`.
    pub fn restore(&self, version_id: &str) -> ModelResult<(ProjectTree, LibraryStore)> {
        let version = self
            .get(version_id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Version, version_id))?;
        Ok((version.tree.clone(), version.library.clone()))
    }

    pub fn delete(&self, version_id: &str) -> ModelResult<Self> {
        let index = self
            .versions
            .iter()
            .position(|version| version.id == version_id)
            .ok_or_else(|| ModelError::not_found(EntityKind::Version, version_id))?;
        let mut next = self.clone();
        next.versions.remove(index);
        Ok(next)
    }

    /// Checks id uniqueness and the integrity of every stored snapshot.
    pub fn validate(&self) -> ModelResult<()> {
        let mut seen = HashSet::new();
        for version in &self.versions {
            if !seen.insert(version.id.as_str()) {
                return Err(ModelError::duplicate(EntityKind::Version, version.id.as_str()));
            }
            version.library.validate()?;
            version.tree.validate(&version.library)?;
        }
        Ok(())
    }
}
