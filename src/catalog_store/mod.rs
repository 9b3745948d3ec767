mod events;
mod models;
mod schema;
mod store;
mod trait_def;

pub use events::{CatalogEntity, CatalogWriteEvent, WriteOperation};
pub use models::{Release, ReleaseTrack, ReleaseType, TrackHit};
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use store::SqliteCatalogStore;
pub use trait_def::CatalogStore;

#[cfg(feature = "mock")]
pub use trait_def::MockCatalogStore;
