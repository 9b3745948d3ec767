mod versioned_schema;

pub use versioned_schema::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, BASE_DB_VERSION,
    DEFAULT_TIMESTAMP,
};

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

/// Open (or create) a SQLite database governed by a versioned schema chain.
///
/// A fresh file gets the latest schema; an existing file is version-checked,
/// validated against its recorded schema, and migrated forward if behind.
pub fn open_versioned_db(path: &Path, schemas: &[VersionedSchema]) -> Result<Connection> {
    let is_new_db = !path.exists();

    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {:?}", path))?;
    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    let latest = schemas.last().expect("schema chain must be non-empty");

    if is_new_db {
        info!("Creating new database at {:?}", path);
        latest.create(&conn)?;
        return Ok(conn);
    }

    let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let db_version = raw_version - BASE_DB_VERSION as i64;

    if db_version < 1 {
        anyhow::bail!(
            "Database {:?} version {} is invalid (expected >= 1)",
            path,
            db_version
        );
    }

    let version_index = schemas
        .iter()
        .position(|s| s.version == db_version as usize)
        .with_context(|| format!("Unknown database version {} in {:?}", db_version, path))?;
    schemas[version_index]
        .validate(&conn)
        .with_context(|| format!("Schema validation failed for version {}", db_version))?;

    let current_version = latest.version as i64;
    if db_version < current_version {
        info!(
            "Migrating database {:?} from version {} to {}",
            path, db_version, current_version
        );
        migrate(&mut conn, schemas, db_version as usize)?;
    }

    Ok(conn)
}

fn migrate(conn: &mut Connection, schemas: &[VersionedSchema], from_version: usize) -> Result<()> {
    let tx = conn.transaction()?;
    let mut latest_from = from_version;
    for schema in schemas {
        if schema.version > from_version {
            info!(
                "Running migration from version {} to {}",
                latest_from, schema.version
            );
            if let Some(migration_fn) = schema.migration {
                migration_fn(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
            latest_from = schema.version;
        }
    }
    tx.execute(
        &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
        [],
    )?;
    tx.commit()?;
    Ok(())
}
