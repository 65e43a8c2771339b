//! Project registry use-case service.
//!
//! # Responsibility
//! - Create, open, list, save, delete, import and export project files.
//! - Persist each completed edit as a full document replacement.
//!
//! # Invariants
//! - Persistence happens only after an in-memory edit fully succeeds.
//! - Import never admits a document whose `meta.id` is already registered.
//! - Log lines carry ids and counts only, never names or entered values.

use crate::codec::{encode_project, import_project, ImportError};
use crate::model::error::ModelError;
use crate::model::project::{ProjectFile, ProjectSummary};
use crate::repo::project_registry::{ProjectRegistry, RegistryError};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by project service operations.
pub type ServiceResult<T> = Result<T, ProjectServiceError>;

/// Errors from project service operations.
#[derive(Debug)]
pub enum ProjectServiceError {
    /// Edit or creation rejected by model validation.
    Model(ModelError),
    /// Imported document refused.
    Import(ImportError),
    /// Target project is not registered.
    ProjectNotFound(String),
    /// Registry-level failure.
    Registry(RegistryError),
}

impl Display for ProjectServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model(err) => write!(f, "{err}"),
            Self::Import(err) => write!(f, "{err}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProjectServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Model(err) => Some(err),
            Self::Import(err) => Some(err),
            Self::ProjectNotFound(_) => None,
            Self::Registry(err) => Some(err),
        }
    }
}

impl From<ModelError> for ProjectServiceError {
    fn from(value: ModelError) -> Self {
        Self::Model(value)
    }
}

impl From<ImportError> for ProjectServiceError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

impl From<RegistryError> for ProjectServiceError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::NotFound(id) => Self::ProjectNotFound(id),
            other => Self::Registry(other),
        }
    }
}

impl From<serde_json::Error> for ProjectServiceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Registry(RegistryError::Encode(value))
    }
}

/// Project service facade over an injected registry.
pub struct ProjectService<R: ProjectRegistry> {
    registry: R,
}

impl<R: ProjectRegistry> ProjectService<R> {
    /// Creates service from registry implementation.
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Creates and persists an empty project seeded with the default library.
    pub fn create_project(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> ServiceResult<ProjectFile> {
        let file = ProjectFile::new(name, description)?;
        self.registry.persist(&file)?;
        info!(
            "event=project_create module=service status=ok project_id={}",
            file.meta.id
        );
        Ok(file)
    }

    /// Loads one project by id.
    pub fn open_project(&self, project_id: &str) -> ServiceResult<ProjectFile> {
        self.registry
            .load(project_id)?
            .ok_or_else(|| ProjectServiceError::ProjectNotFound(project_id.to_string()))
    }

    pub fn list_projects(&self) -> ServiceResult<Vec<ProjectSummary>> {
        Ok(self.registry.list()?)
    }

    /// Persists the current value of one project.
    pub fn save_project(&self, file: &ProjectFile) -> ServiceResult<()> {
        self.registry.persist(file)?;
        info!(
            "event=project_save module=service status=ok project_id={} nodes={} versions={}",
            file.meta.id,
            file.tree().len(),
            file.versions().len()
        );
        Ok(())
    }

    /// Applies one edit to `file` and persists the result.
    ///
    /// On error nothing is persisted and `file` remains the live state.
    pub fn commit<F>(&self, file: &ProjectFile, edit: F) -> ServiceResult<ProjectFile>
    where
        F: FnOnce(&ProjectFile) -> Result<ProjectFile, ModelError>,
    {
        let next = edit(file).inspect_err(|err| {
            info!(
                "event=project_edit module=service status=rejected project_id={} error_code={}",
                file.meta.id,
                err.code()
            );
        })?;
        self.save_project(&next)?;
        Ok(next)
    }

    /// Deletes one project from the registry.
    pub fn delete_project(&self, project_id: &str) -> ServiceResult<()> {
        self.registry.delete(project_id)?;
        info!("event=project_delete module=service status=ok project_id={project_id}");
        Ok(())
    }

    /// Admits a foreign project document into the registry.
    ///
    /// # Errors
    /// - `Import(MalformedDocument)` for unreadable or mistyped documents.
    /// - `Import(DuplicateProjectId)` when `meta.id` is already registered.
    /// - `Import(ReferentialIntegrity)` for dangling library/tree references.
    pub fn import_project(&self, document: &str) -> ServiceResult<ProjectFile> {
        let known = self.registry.list()?;
        let file = import_project(document, &known)?;
        if let Err(err) = self.registry.persist(&file) {
            error!(
                "event=project_import module=service status=error project_id={} error={}",
                file.meta.id, err
            );
            return Err(err.into());
        }
        Ok(file)
    }

    /// Serializes one registered project into its portable document.
    pub fn export_project(&self, project_id: &str) -> ServiceResult<String> {
        let file = self.open_project(project_id)?;
        let document = encode_project(&file)?;
        info!(
            "event=project_export module=service status=ok project_id={project_id} bytes={}",
            document.len()
        );
        Ok(document)
    }
}
