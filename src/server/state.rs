use crate::refresh::{MutationWatcher, RefreshScheduler};
use crate::search::CatalogSearchService;
use crate::server_store::ServerStore;
use std::sync::Arc;

pub type GuardedServerStore = Arc<dyn ServerStore>;

#[derive(Clone)]
pub struct ServerState {
    pub search_service: Arc<CatalogSearchService>,
    pub scheduler: Arc<RefreshScheduler>,
    pub watcher: Arc<MutationWatcher>,
    pub server_store: GuardedServerStore,
}
