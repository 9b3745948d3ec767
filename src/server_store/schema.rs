//! SQLite schema for the server database (audit log).

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};

const AUDIT_LOG_TABLE_V1: Table = Table {
    name: "audit_log",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("event", &SqlType::Text, non_null = true),
        sqlite_column!(
            "metadata",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'{}'")
        ),
        sqlite_column!("actor_user_id", &SqlType::Text),
        sqlite_column!("target", &SqlType::Text),
        sqlite_column!("request_id", &SqlType::Text),
        sqlite_column!(
            "recorded_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_audit_log_event", "event, recorded_at DESC"),
        ("idx_audit_log_recorded_at", "recorded_at"),
    ],
};

pub const SERVER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[AUDIT_LOG_TABLE_V1],
    migration: None,
}];
