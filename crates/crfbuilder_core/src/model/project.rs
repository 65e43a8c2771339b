//! Project file aggregate: metadata plus tree, library and versions.
//!
//! # Responsibility
//! - Pair one Project Tree with the Library Store it references.
//! - Apply edits as whole-value replacements and bump `lastModified`.
//!
//! # Invariants
//! - `meta.id` is globally unique and never changes after creation.
//! - Tree form references and grid data resolve in the paired library after
//!   every edit.
//! - `lastModified` never decreases.

use crate::clock::now_epoch_ms;
use crate::model::error::{EntityKind, ModelError, ModelResult};
use crate::model::library::LibraryStore;
use crate::model::tree::ProjectTree;
use crate::model::version::{ProjectVersion, VersionStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity and bookkeeping fields of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub last_modified: i64,
}

/// Editable content of one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectData {
    /// Root-level document nodes.
    pub project: ProjectTree,
    pub library: LibraryStore,
    pub versions: VersionStore,
}

/// Persisted unit managed by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub meta: ProjectMeta,
    pub data: ProjectData,
}

/// Listing projection used by registry and dashboard callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: i64,
    pub last_modified: i64,
}

impl ProjectFile {
    /// Creates an empty project seeded with the default library.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> ModelResult<Self> {
        let name = normalize_name(name.into())?;
        let now = now_epoch_ms();
        Ok(Self {
            meta: ProjectMeta {
                id: Uuid::new_v4().to_string(),
                name,
                description: description.into(),
                created_at: now,
                last_modified: now,
            },
            data: ProjectData {
                project: ProjectTree::new(),
                library: LibraryStore::default_library(),
                versions: VersionStore::new(),
            },
        })
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn tree(&self) -> &ProjectTree {
        &self.data.project
    }

    pub fn library(&self) -> &LibraryStore {
        &self.data.library
    }

    pub fn versions(&self) -> &VersionStore {
        &self.data.versions
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.meta.id.clone(),
            name: self.meta.name.clone(),
            description: self.meta.description.clone(),
            created_at: self.meta.created_at,
            last_modified: self.meta.last_modified,
        }
    }

    /// Applies one pure tree edit against the paired library.
    ///
    /// The edited tree is re-validated against the paired library.
    pub fn edit_tree<F>(&self, edit: F) -> ModelResult<Self>
    where
        F: FnOnce(&ProjectTree, &LibraryStore) -> ModelResult<ProjectTree>,
    {
        let tree = edit(&self.data.project, &self.data.library)?;
        tree.validate(&self.data.library)?;
        let mut next = self.clone();
        next.data.project = tree;
        Ok(next.touched())
    }

    /// Applies one pure library edit.
    ///
    /// # Errors
    /// - Any error of the edit itself.
    /// - `ReferentialIntegrity` when the edit drops a form a node still uses,
    ///   or a header/column variable a node holds entered values for.
    /// - `InvalidOperation` when a form carrying node grid data stops being a
    ///   grid form.
    pub fn edit_library<F>(&self, edit: F) -> ModelResult<Self>
    where
        F: FnOnce(&LibraryStore) -> ModelResult<LibraryStore>,
    {
        let library = edit(&self.data.library)?;
        self.data
            .project
            .validate(&library)
            .map_err(|err| match err {
                ModelError::DanglingReference {
                    from: EntityKind::Node,
                    from_id,
                    to,
                    to_id,
                } => ModelError::ReferentialIntegrity {
                    kind: to,
                    id: to_id,
                    referenced_by: EntityKind::Node,
                    referrer_id: from_id,
                },
                other => other,
            })?;
        let mut next = self.clone();
        next.data.library = library;
        Ok(next.touched())
    }

    /// Captures the live tree and library as a new version.
    pub fn capture_version(&self, label: impl Into<String>) -> ModelResult<(Self, ProjectVersion)> {
        let (versions, version) =
            self.data
                .versions
                .capture(label, &self.data.project, &self.data.library)?;
        let mut next = self.clone();
        next.data.versions = versions;
        Ok((next.touched(), version))
    }

    /// Replaces the live tree and library with a copy of one version.
    pub fn restore_version(&self, version_id: &str) -> ModelResult<Self> {
        let (tree, library) = self.data.versions.restore(version_id)?;
        let mut next = self.clone();
        next.data.project = tree;
        next.data.library = library;
        Ok(next.touched())
    }

    pub fn delete_version(&self, version_id: &str) -> ModelResult<Self> {
        let versions = self.data.versions.delete(version_id)?;
        let mut next = self.clone();
        next.data.versions = versions;
        Ok(next.touched())
    }

    pub fn rename(&self, name: impl Into<String>) -> ModelResult<Self> {
        let name = normalize_name(name.into())?;
        let mut next = self.clone();
        next.meta.name = name;
        Ok(next.touched())
    }

    pub fn set_description(&self, description: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.meta.description = description.into();
        next.touched()
    }

    /// Checks library, tree and every stored version for integrity.
    pub fn validate(&self) -> ModelResult<()> {
        if self.meta.id.trim().is_empty() {
            return Err(ModelError::invalid("project id must not be blank"));
        }
        self.data.library.validate()?;
        self.data.project.validate(&self.data.library)?;
        self.data.versions.validate()
    }

    fn touched(mut self) -> Self {
        self.meta.last_modified = now_epoch_ms().max(self.meta.last_modified);
        self
    }
}

fn normalize_name(value: String) -> ModelResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ModelError::invalid("project name must not be blank"));
    }
    Ok(trimmed.to_string())
}
