//! Committee schema migrations.
//!
//! # Responsibility
//! - Bring a database up to the committee schema in version order.
//! - Refuse to hand out a database whose recorded version claims tables that
//!   are not there.
//!
//! # Invariants
//! - Steps are listed in strictly increasing `version`; `PRAGMA user_version`
//!   records the last step applied.
//! - All pending steps commit together or not at all.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, OptionalExtension};
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
    /// Tables this step creates and every later version depends on.
    tables: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "committees_and_people",
        sql: include_str!("0001_init.sql"),
        tables: &["users", "employees", "committees"],
    },
    Migration {
        version: 2,
        name: "committee_memberships",
        sql: include_str!("0002_memberships.sql"),
        tables: &["committee_employees"],
    },
    Migration {
        version: 3,
        name: "committee_attachments",
        sql: include_str!("0003_attachments.sql"),
        tables: &["attachments"],
    },
];

/// Latest schema version this build understands.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Migrates `conn` to [`latest_version`] and checks the committee tables.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database was written by a newer build.
/// - `IncompleteSchema` when a table owned by an applied step is missing.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        error!(
            "event=db_migrate module=db status=error from_version={current_version} latest={latest} error_code=schema_too_new"
        );
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version < latest {
        let started_at = Instant::now();
        let tx = conn.transaction()?;
        for migration in MIGRATIONS
            .iter()
            .filter(|migration| migration.version > current_version)
        {
            tx.execute_batch(migration.sql)?;
            tx.pragma_update(None, "user_version", migration.version)?;
            info!(
                "event=db_migrate module=db status=step version={} name={}",
                migration.version, migration.name
            );
        }
        tx.commit()?;
        info!(
            "event=db_migrate module=db status=ok from_version={current_version} to_version={latest} duration_ms={}",
            started_at.elapsed().as_millis()
        );
    }

    verify_tables(conn, latest)
}

/// Tables every applied step owns must exist, even when nothing was pending.
fn verify_tables(conn: &Connection, version: u32) -> DbResult<()> {
    let mut missing_tables = Vec::new();
    for table in MIGRATIONS
        .iter()
        .filter(|migration| migration.version <= version)
        .flat_map(|migration| migration.tables.iter().copied())
    {
        if !table_exists(conn, table)? {
            missing_tables.push(table);
        }
    }

    if missing_tables.is_empty() {
        return Ok(());
    }
    error!(
        "event=db_migrate module=db status=error version={version} missing_tables={} error_code=incomplete_schema",
        missing_tables.join(",")
    );
    Err(DbError::IncompleteSchema {
        version,
        missing_tables,
    })
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
