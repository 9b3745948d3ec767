use super::models::AuditEntry;
use super::schema::SERVER_VERSIONED_SCHEMAS;
use super::ServerStore;
use crate::telemetry::{AuditSink, EventContext};
use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection};
use serde_json::Value as JsonValue;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct SqliteServerStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteServerStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = crate::sqlite_persistence::open_versioned_db(
            db_path.as_ref(),
            SERVER_VERSIONED_SCHEMAS,
        )
        .context("Failed to open server database")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<AuditEntry> {
        let metadata: String = row.get("metadata")?;
        let recorded_at: i64 = row.get("recorded_at")?;
        Ok(AuditEntry {
            id: row.get("id")?,
            event: row.get("event")?,
            metadata: serde_json::from_str(&metadata).unwrap_or(JsonValue::Null),
            actor_user_id: row.get("actor_user_id")?,
            target: row.get("target")?,
            request_id: row.get("request_id")?,
            recorded_at: Utc
                .timestamp_opt(recorded_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
        })
    }
}

impl ServerStore for SqliteServerStore {
    fn append_audit_event(
        &self,
        event: &str,
        metadata: &JsonValue,
        actor_user_id: Option<&str>,
        target: Option<&str>,
        request_id: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO audit_log (event, metadata, actor_user_id, target, request_id, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event,
                metadata.to_string(),
                actor_user_id,
                target,
                request_id,
                Utc::now().timestamp(),
            ],
        )
        .context("Failed to append audit event")?;
        Ok(conn.last_insert_rowid())
    }

    fn get_audit_log(&self, limit: usize, offset: usize) -> Result<Vec<AuditEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, event, metadata, actor_user_id, target, request_id, recorded_at
             FROM audit_log ORDER BY id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let entries = stmt
            .query_map(params![limit as i64, offset as i64], Self::row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn get_audit_log_by_event(
        &self,
        event: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, event, metadata, actor_user_id, target, request_id, recorded_at
             FROM audit_log WHERE event = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
        )?;
        let entries = stmt
            .query_map(
                params![event, limit as i64, offset as i64],
                Self::row_to_entry,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn cleanup_old_audit_entries(&self, before_timestamp: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM audit_log WHERE recorded_at < ?1",
            params![before_timestamp],
        )?;
        Ok(deleted)
    }
}

impl AuditSink for SqliteServerStore {
    fn record(&self, name: &str, metadata: &JsonValue, ctx: &EventContext) -> Result<()> {
        self.append_audit_event(
            name,
            metadata,
            ctx.actor_user_id.as_deref(),
            ctx.target.as_deref(),
            ctx.request_id.as_deref(),
        )?;
        Ok(())
    }
}
