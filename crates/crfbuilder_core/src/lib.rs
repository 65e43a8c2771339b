//! Core domain logic for the CRF project builder.
//! This crate is the single source of truth for library, tree, version and
//! project-file invariants.

pub mod clock;
pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use codec::{decode_project, encode_project, import_project, ImportError};
pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::error::{EntityKind, ModelError, ModelResult};
pub use model::library::{Form, FormType, LibraryStore, Variable, VariableType};
pub use model::project::{ProjectData, ProjectFile, ProjectMeta, ProjectSummary};
pub use model::tree::{DocumentNode, GridInstance, GridRow, NodeId, ProjectTree, TreeNode};
pub use model::version::{ProjectVersion, VersionStore};
pub use repo::project_registry::{
    InMemoryProjectRegistry, ProjectRegistry, RegistryError, RegistryResult,
    SqliteProjectRegistry,
};
pub use service::project_service::{ProjectService, ProjectServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
