//! SQLite migration registry and executor.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - All pending migrations apply in one transaction.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    script: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        script: "0001_trees_members.sql",
        sql: include_str!("0001_trees_members.sql"),
    },
    Migration {
        version: 2,
        script: "0002_couples.sql",
        sql: include_str!("0002_couples.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_pending(conn, MIGRATIONS)
}

fn apply_pending(conn: &mut Connection, migrations: &[Migration]) -> DbResult<()> {
    let current = current_user_version(conn)?;
    let Some(last) = migrations.last() else {
        return Ok(());
    };

    if current > last.version {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: last.version,
            latest_script: last.script,
        });
    }
    if current == last.version {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in migrations.iter().filter(|migration| migration.version > current) {
        let applied = tx.execute_batch(migration.sql).and_then(|()| {
            tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
        });
        if let Err(source) = applied {
            error!(
                "event=db_migrate module=db status=error version={} script={} error={source}",
                migration.version, migration.script
            );
            return Err(DbError::MigrationFailed {
                version: migration.version,
                script: migration.script,
                source,
            });
        }
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={current} to_version={}",
        last.version
    );
    Ok(())
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
