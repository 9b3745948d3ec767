//! Write events emitted by the catalog store.
//!
//! Every completed write to a release or track publishes one
//! [`CatalogWriteEvent`] on an in-process channel. The mutation watcher is
//! the only subscriber; it turns events into refresh tasks. Keeping the
//! contract as plain data makes the watcher testable with synthetic events.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntity {
    Release,
    ReleaseTrack,
}

impl std::fmt::Display for CatalogEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogEntity::Release => write!(f, "Release"),
            CatalogEntity::ReleaseTrack => write!(f, "ReleaseTrack"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for WriteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteOperation::Create => write!(f, "create"),
            WriteOperation::Update => write!(f, "update"),
            WriteOperation::Delete => write!(f, "delete"),
        }
    }
}

/// Snapshot of one completed catalog write.
///
/// The release id may be known from the write's `where` clause, from its
/// input data, or only from its result rows; all three are carried so the
/// subscriber can apply its own preference order.
#[derive(Debug, Clone)]
pub struct CatalogWriteEvent {
    pub entity: CatalogEntity,
    pub operation: WriteOperation,
    pub where_release_id: Option<String>,
    pub data_release_id: Option<String>,
    pub result_release_ids: Vec<String>,
    pub actor_user_id: Option<String>,
}

impl CatalogWriteEvent {
    pub fn new(entity: CatalogEntity, operation: WriteOperation) -> Self {
        Self {
            entity,
            operation,
            where_release_id: None,
            data_release_id: None,
            result_release_ids: Vec::new(),
            actor_user_id: None,
        }
    }

    pub fn with_where_id(mut self, id: impl Into<String>) -> Self {
        self.where_release_id = Some(id.into());
        self
    }

    pub fn with_data_id(mut self, id: impl Into<String>) -> Self {
        self.data_release_id = Some(id.into());
        self
    }

    pub fn with_result_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.result_release_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_actor(mut self, actor: Option<&str>) -> Self {
        self.actor_user_id = actor.map(str::to_string);
        self
    }
}
