//! SQLite schema for the catalog database.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const RELEASES_TABLE_V1: Table = Table {
    name: "releases",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("cover_art_id", &SqlType::Text),
        sqlite_column!("release_type", &SqlType::Text, non_null = true),
        sqlite_column!("creator_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[
        ("idx_releases_title", "title"),
        ("idx_releases_creator", "creator_id"),
        ("idx_releases_created_at", "created_at DESC"),
    ],
};

const RELEASE_FK: ForeignKey = ForeignKey {
    foreign_table: "releases",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const RELEASE_TRACKS_TABLE_V1: Table = Table {
    name: "release_tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("duration_secs", &SqlType::Integer),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "release_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&RELEASE_FK)
        ),
        sqlite_column!("audio_id", &SqlType::Text),
    ],
    indices: &[
        ("idx_release_tracks_title", "title"),
        ("idx_release_tracks_release", "release_id, position"),
    ],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[RELEASES_TABLE_V1, RELEASE_TRACKS_TABLE_V1],
    migration: None,
}];
