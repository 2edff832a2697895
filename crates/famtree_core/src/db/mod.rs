//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for famtree core.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Repositories refuse connections that are not fully migrated.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the family database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// A bundled migration script failed; nothing from the batch was kept.
    MigrationFailed {
        version: u32,
        script: &'static str,
        source: rusqlite::Error,
    },
    /// The file was written by a newer famtree build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
        latest_script: &'static str,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "family database error: {err}"),
            Self::MigrationFailed {
                version,
                script,
                source,
            } => write!(f, "family schema migration {version} ({script}) failed: {source}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
                latest_script,
            } => write!(
                f,
                "family database schema version {db_version} is newer than this build supports \
                 ({latest_supported}, {latest_script})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::MigrationFailed { source: err, .. } => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
