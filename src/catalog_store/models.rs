//! Catalog models for SQLite-backed storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Release type enumeration
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ReleaseType {
    Album,
    Single,
    Ep,
    Compilation,
}

impl ReleaseType {
    /// Convert from database string representation
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "ALBUM" => ReleaseType::Album,
            "SINGLE" => ReleaseType::Single,
            "EP" => ReleaseType::Ep,
            "COMPILATION" => ReleaseType::Compilation,
            _ => ReleaseType::Album,
        }
    }

    /// Convert to database string representation
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReleaseType::Album => "ALBUM",
            ReleaseType::Single => "SINGLE",
            ReleaseType::Ep => "EP",
            ReleaseType::Compilation => "COMPILATION",
        }
    }
}

/// A release (album, single, EP, ...) owned by a creator.
///
/// Identity is immutable, metadata is not.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_art_id: Option<String>,
    pub release_type: ReleaseType,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A track belonging to a release.
///
/// `position` orders tracks within their release; it is not globally unique.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReleaseTrack {
    pub id: String,
    pub title: String,
    pub duration_secs: Option<u32>,
    pub position: u32,
    pub release_id: String,
    pub audio_id: Option<String>,
}

/// A track candidate as returned by the search query, joined with the
/// release columns the scorer needs (recency and creator matching run
/// against the owning release).
#[derive(Clone, Debug, Serialize)]
pub struct TrackHit {
    pub track: ReleaseTrack,
    pub release_creator_id: String,
    pub release_created_at: DateTime<Utc>,
}
