//! Schema setup with a wipe-and-recreate fallback.
//!
//! # Responsibility
//! - Create the note and last-city tables on a fresh database.
//! - Replace the schema wholesale when the stored version is not ours.
//!
//! # Invariants
//! - Applied schema version is mirrored to `PRAGMA user_version`.
//! - Any non-zero version other than `SCHEMA_VERSION` loses all rows.

use crate::db::DbResult;
use log::warn;
use rusqlite::Connection;

/// Version written to `PRAGMA user_version` after setup.
pub const SCHEMA_VERSION: u32 = 2;

const SCHEMA_SQL: &str = include_str!("0002_schema.sql");

const DROP_SQL: &str = "DROP TABLE IF EXISTS note_table;
DROP TABLE IF EXISTS last_city_table;";

/// Returns the schema version known by this binary.
pub fn latest_version() -> u32 {
    SCHEMA_VERSION
}

/// Brings the provided connection to `SCHEMA_VERSION`.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    if current_version == SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    if current_version != 0 {
        warn!(
            "event=db_migrate module=db status=destructive from_version={} to_version={}",
            current_version, SCHEMA_VERSION
        );
        tx.execute_batch(DROP_SQL)?;
    }
    tx.execute_batch(SCHEMA_SQL)?;
    tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
