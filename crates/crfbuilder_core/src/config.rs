//! Core runtime configuration.
//!
//! # Responsibility
//! - Derive log and registry locations from one application data directory.
//! - Validate settings before logging or storage is touched.
//!
//! # Invariants
//! - All paths are absolute.
//! - `log_level` is one of `trace|debug|info|warn|error`.

use crate::logging::{default_log_level, normalize_level};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Directory name for rolling logs under the data directory.
pub const LOG_DIR_NAME: &str = "logs";
/// File name of the SQLite project registry under the data directory.
pub const REGISTRY_FILE_NAME: &str = "crfbuilder_projects.sqlite3";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Path must be absolute.
    RelativePath(PathBuf),
    /// Log level is not recognized.
    UnsupportedLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RelativePath(path) => write!(f, "path must be absolute: {}", path.display()),
            Self::UnsupportedLogLevel(level) => write!(f, "unsupported log level: {level}"),
        }
    }
}

impl Error for ConfigError {}

/// Settings for logging and registry storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub log_level: String,
    pub log_dir: PathBuf,
    pub registry_path: PathBuf,
}

impl CoreConfig {
    /// Builds default settings rooted at `data_dir`.
    pub fn for_data_dir(data_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data_dir = data_dir.as_ref();
        let config = Self {
            log_level: default_log_level().to_string(),
            log_dir: data_dir.join(LOG_DIR_NAME),
            registry_path: data_dir.join(REGISTRY_FILE_NAME),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level)
            .map_err(|_| ConfigError::UnsupportedLogLevel(self.log_level.clone()))?;
        for path in [&self.log_dir, &self.registry_path] {
            if !path.is_absolute() {
                return Err(ConfigError::RelativePath(path.clone()));
            }
        }
        Ok(())
    }
}
