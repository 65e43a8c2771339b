//! Project file codec: JSON export, decode and import admission.
//!
//! # Responsibility
//! - Serialize a Project File into one self-describing JSON document.
//! - Decode documents, rejecting malformed shapes before typed parsing.
//! - Gate imports on project-id collisions and referential integrity.
//!
//! # Invariants
//! - `decode_project(&encode_project(f)?)` is structurally equal to `f`.
//! - Absent optional fields stay absent; explicit empty lists stay empty.
//! - Unknown keys are ignored so newer minor revisions stay readable.
//! - A rejected document is never partially admitted.

use crate::model::error::ModelError;
use crate::model::project::{ProjectFile, ProjectSummary};
use log::{info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Object,
    Array,
    String,
    Integer,
}

impl Shape {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::String => value.is_string(),
            Self::Integer => value.is_i64(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

const REQUIRED_KEYS: &[(&str, Shape)] = &[
    ("/meta", Shape::Object),
    ("/meta/id", Shape::String),
    ("/meta/name", Shape::String),
    ("/meta/description", Shape::String),
    ("/meta/createdAt", Shape::Integer),
    ("/meta/lastModified", Shape::Integer),
    ("/data", Shape::Object),
    ("/data/project", Shape::Array),
    ("/data/library", Shape::Object),
    ("/data/versions", Shape::Array),
];

/// Reasons a document is refused by decode or import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// Not JSON, a required key is absent/mistyped, nested shape is invalid,
    /// or a definition is structurally broken (blank id, duplicate id,
    /// select without options, grid data on a standard form).
    MalformedDocument(String),
    /// `meta.id` already belongs to a project known to the registry.
    DuplicateProjectId(String),
    /// Library, tree or a stored version references something absent.
    ReferentialIntegrity(ModelError),
}

impl ImportError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedDocument(_) => "malformed_document",
            Self::DuplicateProjectId(_) => "duplicate_project_id",
            Self::ReferentialIntegrity(_) => "referential_integrity",
        }
    }
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedDocument(message) => write!(f, "malformed project document: {message}"),
            Self::DuplicateProjectId(id) => write!(f, "project id already exists: {id}"),
            Self::ReferentialIntegrity(err) => write!(f, "referential integrity violated: {err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ReferentialIntegrity(err) => Some(err),
            Self::MalformedDocument(_) => None,
            Self::DuplicateProjectId(_) => None,
        }
    }
}

/// Serializes a project file into its portable JSON document.
pub fn encode_project(file: &ProjectFile) -> serde_json::Result<String> {
    serde_json::to_string_pretty(file)
}

/// Decodes and validates a project document without registry checks.
pub fn decode_project(document: &str) -> Result<ProjectFile, ImportError> {
    let file = parse_document(document)?;
    file.validate().map_err(validation_error)?;
    Ok(file)
}

/// Decodes a foreign document and admits it against current registry contents.
///
/// Checks run in order: document shape, project-id collision, referential
/// integrity. The first failure rejects the whole document.
pub fn import_project(
    document: &str,
    registry_contents: &[ProjectSummary],
) -> Result<ProjectFile, ImportError> {
    let result = parse_document(document).and_then(|file| {
        if registry_contents
            .iter()
            .any(|summary| summary.id == file.meta.id)
        {
            return Err(ImportError::DuplicateProjectId(file.meta.id));
        }
        file.validate().map_err(validation_error)?;
        Ok(file)
    });

    match &result {
        Ok(file) => info!(
            "event=project_import module=codec status=ok project_id={} nodes={} versions={}",
            file.meta.id,
            file.tree().len(),
            file.versions().len()
        ),
        Err(err) => warn!(
            "event=project_import module=codec status=rejected error_code={}",
            err.code()
        ),
    }
    result
}

fn parse_document(document: &str) -> Result<ProjectFile, ImportError> {
    let value: Value = serde_json::from_str(document)
        .map_err(|err| ImportError::MalformedDocument(format!("invalid JSON: {err}")))?;
    check_required_keys(&value)?;
    serde_json::from_value(value).map_err(|err| ImportError::MalformedDocument(err.to_string()))
}

/// Splits model validation failures into structural and referential faults.
fn validation_error(err: ModelError) -> ImportError {
    match err {
        ModelError::InvalidOperation(message) => ImportError::MalformedDocument(message),
        ModelError::DuplicateId { .. } => ImportError::MalformedDocument(err.to_string()),
        other => ImportError::ReferentialIntegrity(other),
    }
}

fn check_required_keys(value: &Value) -> Result<(), ImportError> {
    for (pointer, shape) in REQUIRED_KEYS {
        match value.pointer(pointer) {
            None => {
                return Err(ImportError::MalformedDocument(format!(
                    "missing required key `{}`",
                    display_path(pointer)
                )));
            }
            Some(found) if !shape.matches(found) => {
                return Err(ImportError::MalformedDocument(format!(
                    "key `{}` must be {}",
                    display_path(pointer),
                    shape.as_str()
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn display_path(pointer: &str) -> String {
    pointer.trim_start_matches('/').replace('/', ".")
}
