//! Registry database bootstrap.
//!
//! # Responsibility
//! - Resolve the registry file from `CoreConfig` and open it.
//! - Apply schema migrations before any registry access.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A database newer than this build is refused, never downgraded.

use crate::config::ConfigError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_registry_db};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the registry database.
#[derive(Debug)]
pub enum DbError {
    /// Configuration rejected before touching the filesystem.
    Config(ConfigError),
    /// Registry directory could not be created.
    Io(std::io::Error),
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "db_config_invalid",
            Self::Io(_) => "db_dir_unavailable",
            Self::Sqlite(_) => "db_sqlite_failed",
            Self::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid registry configuration: {err}"),
            Self::Io(err) => write!(f, "registry directory unavailable: {err}"),
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "registry schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<ConfigError> for DbError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
