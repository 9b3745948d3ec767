//! Aggregated ranking signals and listener profiles.
//!
//! These rows are produced by an external analytics job; this service only
//! reads them (the write methods exist for that job's ingest path and for
//! test fixtures). A missing row is a normal condition and scores as
//! zero/empty.

use serde::{Deserialize, Serialize};

/// Popularity/editorial signals for one release.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReleaseSignal {
    pub release_id: String,
    pub play_count: u64,
    pub editorial_weight: i64,
    pub genres: Vec<String>,
    pub trending_regions: Vec<String>,
}

/// Popularity/editorial signals for one track.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackSignal {
    pub track_id: String,
    pub play_count: u64,
    pub editorial_weight: i64,
    pub genres: Vec<String>,
}

/// Per-listener personalization profile. Not every listener has one.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListenerProfile {
    pub user_id: String,
    pub favorite_genres: Vec<String>,
    pub followed_creators: Vec<String>,
}
