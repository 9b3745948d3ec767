use super::models::{ListenerProfile, ReleaseSignal, TrackSignal};
use super::schema::SIGNAL_VERSIONED_SCHEMAS;
use super::SignalStore;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct SqliteSignalStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSignalStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = crate::sqlite_persistence::open_versioned_db(
            db_path.as_ref(),
            SIGNAL_VERSIONED_SCHEMAS,
        )
        .context("Failed to open signals database")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn placeholders(count: usize) -> String {
        (1..=count)
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn decode_tags(json: &str) -> Vec<String> {
        serde_json::from_str(json).unwrap_or_default()
    }

    fn encode_tags(tags: &[String]) -> String {
        serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
    }
}

impl SignalStore for SqliteSignalStore {
    fn release_signals(&self, release_ids: &[String]) -> Result<HashMap<String, ReleaseSignal>> {
        if release_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT release_id, play_count, editorial_weight, genres, trending_regions
             FROM release_signals WHERE release_id IN ({})",
            Self::placeholders(release_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let signals = stmt
            .query_map(rusqlite::params_from_iter(release_ids), |row| {
                let genres: String = row.get("genres")?;
                let trending_regions: String = row.get("trending_regions")?;
                Ok(ReleaseSignal {
                    release_id: row.get("release_id")?,
                    play_count: row.get::<_, i64>("play_count")?.max(0) as u64,
                    editorial_weight: row.get("editorial_weight")?,
                    genres: Self::decode_tags(&genres),
                    trending_regions: Self::decode_tags(&trending_regions),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query release signals")?;
        Ok(signals
            .into_iter()
            .map(|s| (s.release_id.clone(), s))
            .collect())
    }

    fn track_signals(&self, track_ids: &[String]) -> Result<HashMap<String, TrackSignal>> {
        if track_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT track_id, play_count, editorial_weight, genres
             FROM track_signals WHERE track_id IN ({})",
            Self::placeholders(track_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let signals = stmt
            .query_map(rusqlite::params_from_iter(track_ids), |row| {
                let genres: String = row.get("genres")?;
                Ok(TrackSignal {
                    track_id: row.get("track_id")?,
                    play_count: row.get::<_, i64>("play_count")?.max(0) as u64,
                    editorial_weight: row.get("editorial_weight")?,
                    genres: Self::decode_tags(&genres),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query track signals")?;
        Ok(signals
            .into_iter()
            .map(|s| (s.track_id.clone(), s))
            .collect())
    }

    fn listener_profile(&self, user_id: &str) -> Result<Option<ListenerProfile>> {
        let conn = self.conn.lock().unwrap();
        let profile = conn
            .query_row(
                "SELECT user_id, favorite_genres, followed_creators
                 FROM listener_profiles WHERE user_id = ?1",
                params![user_id],
                |row| {
                    let favorite_genres: String = row.get("favorite_genres")?;
                    let followed_creators: String = row.get("followed_creators")?;
                    Ok(ListenerProfile {
                        user_id: row.get("user_id")?,
                        favorite_genres: Self::decode_tags(&favorite_genres),
                        followed_creators: Self::decode_tags(&followed_creators),
                    })
                },
            )
            .optional()
            .context("Failed to query listener profile")?;
        Ok(profile)
    }

    fn upsert_release_signal(&self, signal: &ReleaseSignal) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO release_signals
                (release_id, play_count, editorial_weight, genres, trending_regions)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(release_id) DO UPDATE SET
                play_count = excluded.play_count,
                editorial_weight = excluded.editorial_weight,
                genres = excluded.genres,
                trending_regions = excluded.trending_regions",
            params![
                signal.release_id,
                signal.play_count as i64,
                signal.editorial_weight,
                Self::encode_tags(&signal.genres),
                Self::encode_tags(&signal.trending_regions),
            ],
        )
        .context("Failed to upsert release signal")?;
        Ok(())
    }

    fn upsert_track_signal(&self, signal: &TrackSignal) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO track_signals (track_id, play_count, editorial_weight, genres)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(track_id) DO UPDATE SET
                play_count = excluded.play_count,
                editorial_weight = excluded.editorial_weight,
                genres = excluded.genres",
            params![
                signal.track_id,
                signal.play_count as i64,
                signal.editorial_weight,
                Self::encode_tags(&signal.genres),
            ],
        )
        .context("Failed to upsert track signal")?;
        Ok(())
    }

    fn upsert_listener_profile(&self, profile: &ListenerProfile) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO listener_profiles (user_id, favorite_genres, followed_creators)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                favorite_genres = excluded.favorite_genres,
                followed_creators = excluded.followed_creators",
            params![
                profile.user_id,
                Self::encode_tags(&profile.favorite_genres),
                Self::encode_tags(&profile.followed_creators),
            ],
        )
        .context("Failed to upsert listener profile")?;
        Ok(())
    }
}
