mod models;
mod schema;
mod sqlite_server_store;

pub use models::AuditEntry;
pub use schema::SERVER_VERSIONED_SCHEMAS;
pub use sqlite_server_store::SqliteServerStore;

use anyhow::Result;
use serde_json::Value as JsonValue;

/// Durable server-side state: the audit log of pipeline actions.
pub trait ServerStore: Send + Sync {
    /// Append a new audit entry. Returns the entry id.
    fn append_audit_event(
        &self,
        event: &str,
        metadata: &JsonValue,
        actor_user_id: Option<&str>,
        target: Option<&str>,
        request_id: Option<&str>,
    ) -> Result<i64>;

    /// Newest entries first.
    fn get_audit_log(&self, limit: usize, offset: usize) -> Result<Vec<AuditEntry>>;
    fn get_audit_log_by_event(
        &self,
        event: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEntry>>;

    /// Delete entries recorded before the given unix timestamp (for
    /// retention pruning). Returns the number of deleted entries.
    fn cleanup_old_audit_entries(&self, before_timestamp: i64) -> Result<usize>;
}
