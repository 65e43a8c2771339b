//! Domain validation errors shared by library, tree and version operations.
//!
//! # Responsibility
//! - Name every local validation failure a mutating operation can surface.
//! - Carry enough identity detail for the operator to locate the problem.
//!
//! # Invariants
//! - Errors are deterministic; callers never retry them.
//! - An operation that returns an error leaves its input value unchanged.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by pure model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Entity category used to qualify ids in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Variable,
    Form,
    Node,
    Row,
    Version,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::Form => "form",
            Self::Node => "node",
            Self::Row => "row",
            Self::Version => "version",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures of library, tree and version operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// An entity with the same id already exists in its container.
    DuplicateId { kind: EntityKind, id: String },
    /// A reference names an entity absent from the paired library.
    DanglingReference {
        from: EntityKind,
        from_id: String,
        to: EntityKind,
        to_id: String,
    },
    /// Removing or changing an entity would break an existing reference.
    ReferentialIntegrity {
        kind: EntityKind,
        id: String,
        referenced_by: EntityKind,
        referrer_id: String,
    },
    /// Target entity does not exist.
    NotFound { kind: EntityKind, id: String },
    /// Move would place a node under itself or one of its descendants.
    Cycle { node_id: String, parent_id: String },
    /// Operation is not valid for the current shape of the target.
    InvalidOperation(String),
}

impl ModelError {
    pub(crate) fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn duplicate(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::DuplicateId {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Stable machine-readable code for logs and UI mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateId { .. } => "duplicate_id",
            Self::DanglingReference { .. } => "dangling_reference",
            Self::ReferentialIntegrity { .. } => "referential_integrity",
            Self::NotFound { .. } => "not_found",
            Self::Cycle { .. } => "cycle",
            Self::InvalidOperation(_) => "invalid_operation",
        }
    }
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId { kind, id } => write!(f, "{kind} id already exists: {id}"),
            Self::DanglingReference {
                from,
                from_id,
                to,
                to_id,
            } => write!(f, "{from} {from_id} references missing {to} {to_id}"),
            Self::ReferentialIntegrity {
                kind,
                id,
                referenced_by,
                referrer_id,
            } => write!(
                f,
                "{kind} {id} is still referenced by {referenced_by} {referrer_id}"
            ),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::Cycle { node_id, parent_id } => write!(
                f,
                "move would create cycle: node {node_id} under parent {parent_id}"
            ),
            Self::InvalidOperation(message) => write!(f, "invalid operation: {message}"),
        }
    }
}

impl Error for ModelError {}
