//! Project registry contract and storage implementations.
//!
//! # Responsibility
//! - Define the `list/load/persist/delete` boundary the core consumes.
//! - Store each project as one serialized document keyed by `meta.id`.
//!
//! # Invariants
//! - `persist` replaces the whole stored document; there are no partial patches.
//! - Listing is deterministic: `last_modified DESC, project_id ASC`.
//! - Loaded documents are re-validated; invalid persisted state is reported,
//!   never masked.
//! - Deleting the last project leaves an explicitly empty registry.

use crate::codec::{decode_project, encode_project};
use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::project::{ProjectFile, ProjectSummary};
use rusqlite::{params, Connection, Row};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors from registry storage operations.
#[derive(Debug)]
pub enum RegistryError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Project could not be serialized.
    Encode(serde_json::Error),
    /// Target project does not exist.
    NotFound(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Stored document cannot be decoded into a valid project.
    InvalidData(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode project: {err}"),
            Self::NotFound(id) => write!(f, "project not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "project registry requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid stored project: {message}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::NotFound(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RegistryError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Durable collection of project files.
pub trait ProjectRegistry {
    /// Lists summaries of every stored project.
    fn list(&self) -> RegistryResult<Vec<ProjectSummary>>;
    /// Loads one project by id, `None` when absent.
    fn load(&self, project_id: &str) -> RegistryResult<Option<ProjectFile>>;
    /// Inserts or fully replaces one project.
    fn persist(&self, file: &ProjectFile) -> RegistryResult<()>;
    /// Deletes one project.
    fn delete(&self, project_id: &str) -> RegistryResult<()>;
}

/// SQLite-backed registry, one row per project.
pub struct SqliteProjectRegistry<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProjectRegistry<'conn> {
    /// Creates registry from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RegistryResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RegistryError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }
}

impl ProjectRegistry for SqliteProjectRegistry<'_> {
    fn list(&self) -> RegistryResult<Vec<ProjectSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT project_id, name, description, created_at, last_modified
             FROM project_files
             ORDER BY last_modified DESC, project_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_summary_row(row)?);
        }
        Ok(items)
    }

    fn load(&self, project_id: &str) -> RegistryResult<Option<ProjectFile>> {
        let mut stmt = self
            .conn
            .prepare("SELECT document FROM project_files WHERE project_id = ?1;")?;
        let mut rows = stmt.query([project_id])?;
        match rows.next()? {
            Some(row) => {
                let document: String = row.get(0)?;
                decode_stored(project_id, &document).map(Some)
            }
            None => Ok(None),
        }
    }

    fn persist(&self, file: &ProjectFile) -> RegistryResult<()> {
        let document = encode_project(file)?;
        self.conn.execute(
            "INSERT INTO project_files (
                project_id,
                name,
                description,
                created_at,
                last_modified,
                document
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(project_id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                created_at = excluded.created_at,
                last_modified = excluded.last_modified,
                document = excluded.document;",
            params![
                file.meta.id,
                file.meta.name,
                file.meta.description,
                file.meta.created_at,
                file.meta.last_modified,
                document,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, project_id: &str) -> RegistryResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM project_files WHERE project_id = ?1;", [project_id])?;
        if changed == 0 {
            return Err(RegistryError::NotFound(project_id.to_string()));
        }
        Ok(())
    }
}

/// Process-local registry holding serialized documents.
///
/// Stores encoded text rather than live values so loads never alias
/// previously persisted state.
#[derive(Debug, Default)]
pub struct InMemoryProjectRegistry {
    documents: RefCell<BTreeMap<String, (ProjectSummary, String)>>,
}

impl InMemoryProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.borrow().is_empty()
    }
}

impl ProjectRegistry for InMemoryProjectRegistry {
    fn list(&self) -> RegistryResult<Vec<ProjectSummary>> {
        let mut items: Vec<ProjectSummary> = self
            .documents
            .borrow()
            .values()
            .map(|(summary, _)| summary.clone())
            .collect();
        items.sort_by(|left, right| {
            right
                .last_modified
                .cmp(&left.last_modified)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(items)
    }

    fn load(&self, project_id: &str) -> RegistryResult<Option<ProjectFile>> {
        match self.documents.borrow().get(project_id) {
            Some((_, document)) => decode_stored(project_id, document).map(Some),
            None => Ok(None),
        }
    }

    fn persist(&self, file: &ProjectFile) -> RegistryResult<()> {
        let document = encode_project(file)?;
        self.documents
            .borrow_mut()
            .insert(file.meta.id.clone(), (file.summary(), document));
        Ok(())
    }

    fn delete(&self, project_id: &str) -> RegistryResult<()> {
        self.documents
            .borrow_mut()
            .remove(project_id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(project_id.to_string()))
    }
}

fn decode_stored(project_id: &str, document: &str) -> RegistryResult<ProjectFile> {
    let file = decode_project(document)
        .map_err(|err| RegistryError::InvalidData(format!("project {project_id}: {err}")))?;
    if file.meta.id != project_id {
        return Err(RegistryError::InvalidData(format!(
            "project {project_id} stores document with id {}",
            file.meta.id
        )));
    }
    Ok(file)
}

fn parse_summary_row(row: &Row<'_>) -> RegistryResult<ProjectSummary> {
    Ok(ProjectSummary {
        id: row.get("project_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        last_modified: row.get("last_modified")?,
    })
}
