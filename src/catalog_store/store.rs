use super::events::{CatalogEntity, CatalogWriteEvent, WriteOperation};
use super::models::{Release, ReleaseTrack, ReleaseType, TrackHit};
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::CatalogStore;
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
    write_events: Mutex<Option<UnboundedSender<CatalogWriteEvent>>>,
}

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = crate::sqlite_persistence::open_versioned_db(
            db_path.as_ref(),
            CATALOG_VERSIONED_SCHEMAS,
        )
        .context("Failed to open catalog database")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            write_events: Mutex::new(None),
        })
    }

    /// Install the channel that receives one event per completed write.
    /// There is a single subscriber per process (the mutation watcher).
    pub fn set_write_observer(&self, sender: UnboundedSender<CatalogWriteEvent>) {
        *self.write_events.lock().unwrap() = Some(sender);
    }

    fn emit(&self, event: CatalogWriteEvent) {
        if let Some(sender) = self.write_events.lock().unwrap().as_ref() {
            // The receiver may already be gone during shutdown.
            if sender.send(event).is_err() {
                debug!("Catalog write event dropped: observer channel closed");
            }
        }
    }

    fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
    }

    fn row_to_release(row: &rusqlite::Row) -> rusqlite::Result<Release> {
        let release_type: String = row.get("release_type")?;
        Ok(Release {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            cover_art_id: row.get("cover_art_id")?,
            release_type: ReleaseType::from_db_str(&release_type),
            creator_id: row.get("creator_id")?,
            created_at: Self::timestamp_to_datetime(row.get("created_at")?),
            updated_at: Self::timestamp_to_datetime(row.get("updated_at")?),
        })
    }

    fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<ReleaseTrack> {
        Ok(ReleaseTrack {
            id: row.get("id")?,
            title: row.get("title")?,
            duration_secs: row.get::<_, Option<i64>>("duration_secs")?.map(|d| d as u32),
            position: row.get::<_, i64>("position")? as u32,
            release_id: row.get("release_id")?,
            audio_id: row.get("audio_id")?,
        })
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn search_releases(&self, query: &str, limit: usize) -> Result<Vec<Release>> {
        let conn = self.conn.lock().unwrap();
        let pattern = format!("%{}%", query.to_lowercase());
        let mut stmt = conn.prepare(
            "SELECT id, title, description, cover_art_id, release_type, creator_id,
                    created_at, updated_at
             FROM releases
             WHERE lower(title) LIKE ?1 OR lower(coalesce(description, '')) LIKE ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let releases = stmt
            .query_map(params![pattern, limit as i64], Self::row_to_release)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query release candidates")?;
        Ok(releases)
    }

    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<TrackHit>> {
        let conn = self.conn.lock().unwrap();
        let pattern = format!("%{}%", query.to_lowercase());
        let mut stmt = conn.prepare(
            "SELECT t.id, t.title, t.duration_secs, t.position, t.release_id, t.audio_id,
                    r.creator_id AS release_creator_id, r.created_at AS release_created_at
             FROM release_tracks t
             JOIN releases r ON r.id = t.release_id
             WHERE lower(t.title) LIKE ?1
             ORDER BY t.position ASC
             LIMIT ?2",
        )?;
        let hits = stmt
            .query_map(params![pattern, limit as i64], |row| {
                Ok(TrackHit {
                    track: Self::row_to_track(row)?,
                    release_creator_id: row.get("release_creator_id")?,
                    release_created_at: Self::timestamp_to_datetime(
                        row.get("release_created_at")?,
                    ),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to query track candidates")?;
        Ok(hits)
    }

    fn get_release(&self, id: &str) -> Result<Option<Release>> {
        let conn = self.conn.lock().unwrap();
        let release = conn
            .query_row(
                "SELECT id, title, description, cover_art_id, release_type, creator_id,
                        created_at, updated_at
                 FROM releases WHERE id = ?1",
                params![id],
                Self::row_to_release,
            )
            .optional()?;
        Ok(release)
    }

    fn get_release_tracks(&self, release_id: &str) -> Result<Vec<ReleaseTrack>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, duration_secs, position, release_id, audio_id
             FROM release_tracks WHERE release_id = ?1 ORDER BY position ASC",
        )?;
        let tracks = stmt
            .query_map(params![release_id], Self::row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    fn list_release_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM releases ORDER BY created_at ASC")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn create_release(&self, release: &Release, actor: Option<&str>) -> Result<()> {
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO releases
                    (id, title, description, cover_art_id, release_type, creator_id,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    release.id,
                    release.title,
                    release.description,
                    release.cover_art_id,
                    release.release_type.to_db_str(),
                    release.creator_id,
                    release.created_at.timestamp(),
                    release.updated_at.timestamp(),
                ],
            )
            .context("Failed to insert release")?;
        }
        self.emit(
            CatalogWriteEvent::new(CatalogEntity::Release, WriteOperation::Create)
                .with_data_id(&release.id)
                .with_result_ids([release.id.as_str()])
                .with_actor(actor),
        );
        Ok(())
    }

    fn update_release(&self, release: &Release, actor: Option<&str>) -> Result<()> {
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE releases
                 SET title = ?2, description = ?3, cover_art_id = ?4, release_type = ?5,
                     updated_at = ?6
                 WHERE id = ?1",
                params![
                    release.id,
                    release.title,
                    release.description,
                    release.cover_art_id,
                    release.release_type.to_db_str(),
                    Utc::now().timestamp(),
                ],
            )
            .context("Failed to update release")?;
        }
        self.emit(
            CatalogWriteEvent::new(CatalogEntity::Release, WriteOperation::Update)
                .with_where_id(&release.id)
                .with_data_id(&release.id)
                .with_actor(actor),
        );
        Ok(())
    }

    fn delete_release(&self, id: &str, actor: Option<&str>) -> Result<bool> {
        let deleted = {
            let conn = self.conn.lock().unwrap();
            conn.execute("DELETE FROM releases WHERE id = ?1", params![id])? > 0
        };
        if deleted {
            self.emit(
                CatalogWriteEvent::new(CatalogEntity::Release, WriteOperation::Delete)
                    .with_where_id(id)
                    .with_actor(actor),
            );
        }
        Ok(deleted)
    }

    fn create_track(&self, track: &ReleaseTrack, actor: Option<&str>) -> Result<()> {
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO release_tracks
                    (id, title, duration_secs, position, release_id, audio_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    track.id,
                    track.title,
                    track.duration_secs,
                    track.position,
                    track.release_id,
                    track.audio_id,
                ],
            )
            .context("Failed to insert track")?;
        }
        self.emit(
            CatalogWriteEvent::new(CatalogEntity::ReleaseTrack, WriteOperation::Create)
                .with_data_id(&track.release_id)
                .with_result_ids([track.release_id.as_str()])
                .with_actor(actor),
        );
        Ok(())
    }

    fn create_tracks(&self, tracks: &[ReleaseTrack], actor: Option<&str>) -> Result<()> {
        if tracks.is_empty() {
            return Ok(());
        }
        {
            let mut conn = self.conn.lock().unwrap();
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO release_tracks
                        (id, title, duration_secs, position, release_id, audio_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for track in tracks {
                    stmt.execute(params![
                        track.id,
                        track.title,
                        track.duration_secs,
                        track.position,
                        track.release_id,
                        track.audio_id,
                    ])?;
                }
            }
            tx.commit().context("Failed to insert track batch")?;
        }
        // Bulk writes may span releases; the event result carries every
        // touched release id, the watcher deduplicates.
        self.emit(
            CatalogWriteEvent::new(CatalogEntity::ReleaseTrack, WriteOperation::Create)
                .with_result_ids(tracks.iter().map(|t| t.release_id.as_str()))
                .with_actor(actor),
        );
        Ok(())
    }

    fn update_track(&self, track: &ReleaseTrack, actor: Option<&str>) -> Result<()> {
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "UPDATE release_tracks
                 SET title = ?2, duration_secs = ?3, position = ?4, audio_id = ?5
                 WHERE id = ?1",
                params![
                    track.id,
                    track.title,
                    track.duration_secs,
                    track.position,
                    track.audio_id,
                ],
            )
            .context("Failed to update track")?;
        }
        self.emit(
            CatalogWriteEvent::new(CatalogEntity::ReleaseTrack, WriteOperation::Update)
                .with_where_id(&track.release_id)
                .with_actor(actor),
        );
        Ok(())
    }

    fn delete_track(&self, id: &str, actor: Option<&str>) -> Result<bool> {
        let release_id: Option<String> = {
            let conn = self.conn.lock().unwrap();
            let release_id = conn
                .query_row(
                    "SELECT release_id FROM release_tracks WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            if release_id.is_some() {
                conn.execute("DELETE FROM release_tracks WHERE id = ?1", params![id])?;
            }
            release_id
        };
        match release_id {
            Some(release_id) => {
                self.emit(
                    CatalogWriteEvent::new(CatalogEntity::ReleaseTrack, WriteOperation::Delete)
                        .with_where_id(release_id)
                        .with_actor(actor),
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn release_count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM releases", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn track_count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM release_tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_release(id: &str, title: &str, created_at: DateTime<Utc>) -> Release {
        Release {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            cover_art_id: None,
            release_type: ReleaseType::Album,
            creator_id: "creator-1".to_string(),
            created_at,
            updated_at: created_at,
        }
    }

    fn make_track(id: &str, title: &str, release_id: &str, position: u32) -> ReleaseTrack {
        ReleaseTrack {
            id: id.to_string(),
            title: title.to_string(),
            duration_secs: Some(180),
            position,
            release_id: release_id.to_string(),
            audio_id: None,
        }
    }

    fn create_store() -> (SqliteCatalogStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteCatalogStore::new(temp_dir.path().join("catalog.db")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_search_releases_matches_title_and_description() {
        let (store, _dir) = create_store();
        let now = Utc::now();

        let a = make_release("rel-a", "Echoes of Dawn", now);
        let mut b = make_release("rel-b", "Night Drive", now);
        b.description = Some("An echo chamber of synths".to_string());
        let c = make_release("rel-c", "Unrelated", now);

        store.create_release(&a, None).unwrap();
        store.create_release(&b, None).unwrap();
        store.create_release(&c, None).unwrap();

        let results = store.search_releases("ECHO", 10).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"rel-a"));
        assert!(ids.contains(&"rel-b"));
    }

    #[test]
    fn test_search_releases_orders_newest_first_and_caps_limit() {
        let (store, _dir) = create_store();
        let base = Utc::now();

        for i in 0..5 {
            let created = base - chrono::Duration::days(i);
            let release = make_release(&format!("rel-{}", i), &format!("Echo {}", i), created);
            store.create_release(&release, None).unwrap();
        }

        let results = store.search_releases("echo", 3).unwrap();
        assert_eq!(results.len(), 3);
        // rel-0 is the newest
        assert_eq!(results[0].id, "rel-0");
        assert_eq!(results[1].id, "rel-1");
        assert_eq!(results[2].id, "rel-2");
    }

    #[test]
    fn test_search_tracks_joins_release_columns() {
        let (store, _dir) = create_store();
        let created = Utc::now() - chrono::Duration::days(10);
        let release = make_release("rel-1", "Album", created);
        store.create_release(&release, None).unwrap();
        store
            .create_track(&make_track("trk-1", "Echo Canyon", "rel-1", 3), None)
            .unwrap();

        let hits = store.search_tracks("echo", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].track.id, "trk-1");
        assert_eq!(hits[0].release_creator_id, "creator-1");
        assert_eq!(hits[0].release_created_at.timestamp(), created.timestamp());
    }

    #[test]
    fn test_write_events_emitted_with_actor() {
        let (store, _dir) = create_store();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        store.set_write_observer(tx);

        let release = make_release("rel-1", "Album", Utc::now());
        store.create_release(&release, Some("admin-7")).unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.entity, CatalogEntity::Release);
        assert_eq!(event.operation, WriteOperation::Create);
        assert_eq!(event.data_release_id.as_deref(), Some("rel-1"));
        assert_eq!(event.actor_user_id.as_deref(), Some("admin-7"));
    }

    #[test]
    fn test_bulk_track_insert_emits_all_release_ids() {
        let (store, _dir) = create_store();
        store
            .create_release(&make_release("rel-1", "One", Utc::now()), None)
            .unwrap();
        store
            .create_release(&make_release("rel-2", "Two", Utc::now()), None)
            .unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        store.set_write_observer(tx);

        let tracks = vec![
            make_track("trk-1", "A", "rel-1", 1),
            make_track("trk-2", "B", "rel-1", 2),
            make_track("trk-3", "C", "rel-2", 1),
        ];
        store.create_tracks(&tracks, None).unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.entity, CatalogEntity::ReleaseTrack);
        assert_eq!(event.result_release_ids, vec!["rel-1", "rel-1", "rel-2"]);
    }

    #[test]
    fn test_delete_missing_release_is_not_an_error() {
        let (store, _dir) = create_store();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        store.set_write_observer(tx);

        assert!(!store.delete_release("nope", None).unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_deleting_release_cascades_to_tracks() {
        let (store, _dir) = create_store();
        store
            .create_release(&make_release("rel-1", "One", Utc::now()), None)
            .unwrap();
        store
            .create_track(&make_track("trk-1", "A", "rel-1", 1), None)
            .unwrap();

        assert!(store.delete_release("rel-1", None).unwrap());
        assert_eq!(store.track_count().unwrap(), 0);
    }
}
