//! Core configuration loaded from TOML.
//!
//! # Invariants
//! - Every field has a default, so an empty file is a valid configuration.
//! - `max_commit_retries` is at least 1.

use crate::graph::RootPolicy;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_MAX_COMMIT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite database file. In-memory when absent.
    pub db_path: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub policy: TreePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// File logging stays off when absent.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            dir: None,
        }
    }
}

/// Relationship rules applied by the family service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreePolicy {
    pub allow_multiple_roots: bool,
    /// Commit attempts per write before giving up on a busy tree.
    pub max_commit_retries: u32,
}

impl Default for TreePolicy {
    fn default() -> Self {
        Self {
            allow_multiple_roots: true,
            max_commit_retries: DEFAULT_MAX_COMMIT_RETRIES,
        }
    }
}

impl TreePolicy {
    pub fn root_policy(&self) -> RootPolicy {
        if self.allow_multiple_roots {
            RootPolicy::Multiple
        } else {
            RootPolicy::Single
        }
    }
}

/// Configuration load failures.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    InvalidValue { field: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::InvalidValue { field, message } => {
                write!(f, "invalid config value `{field}`: {message}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl CoreConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.policy.max_commit_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "policy.max_commit_retries",
                message: "must be at least 1".to_string(),
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level",
                message: "must not be blank".to_string(),
            });
        }
        Ok(())
    }
}
