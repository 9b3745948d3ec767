//! SQLite schema for the signals database.
//!
//! Tag lists are JSON-encoded TEXT columns; they are opaque to SQL and only
//! ever read back whole.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const RELEASE_SIGNALS_TABLE_V1: Table = Table {
    name: "release_signals",
    columns: &[
        sqlite_column!("release_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "play_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "editorial_weight",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "genres",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'[]'")
        ),
        sqlite_column!(
            "trending_regions",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'[]'")
        ),
    ],
    indices: &[],
};

const TRACK_SIGNALS_TABLE_V1: Table = Table {
    name: "track_signals",
    columns: &[
        sqlite_column!("track_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "play_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "editorial_weight",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "genres",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'[]'")
        ),
    ],
    indices: &[],
};

const LISTENER_PROFILES_TABLE_V1: Table = Table {
    name: "listener_profiles",
    columns: &[
        sqlite_column!("user_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "favorite_genres",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'[]'")
        ),
        sqlite_column!(
            "followed_creators",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'[]'")
        ),
    ],
    indices: &[],
};

pub const SIGNAL_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        RELEASE_SIGNALS_TABLE_V1,
        TRACK_SIGNALS_TABLE_V1,
        LISTENER_PROFILES_TABLE_V1,
    ],
    migration: None,
}];
