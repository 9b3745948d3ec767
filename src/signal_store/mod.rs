mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{ListenerProfile, ReleaseSignal, TrackSignal};
pub use schema::SIGNAL_VERSIONED_SCHEMAS;
pub use store::SqliteSignalStore;
pub use trait_def::SignalStore;

#[cfg(feature = "mock")]
pub use trait_def::MockSignalStore;
