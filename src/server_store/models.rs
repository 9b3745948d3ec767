use chrono::{DateTime, Utc};
use serde::Serialize;

/// One durable audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub event: String,
    pub metadata: serde_json::Value,
    pub actor_user_id: Option<String>,
    pub target: Option<String>,
    pub request_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
