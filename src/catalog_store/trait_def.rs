use super::models::{Release, ReleaseTrack, TrackHit};
use anyhow::Result;

/// Storage interface for the release/track catalog.
///
/// Reads are shaped for the search service: candidate queries are bounded by
/// the caller's limit and pre-sorted by a stable secondary key (creation
/// time for releases, position for tracks). Writes take an optional acting
/// user id so the mutation watcher can attribute refresh tasks.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait CatalogStore: Send + Sync {
    /// Case-insensitive substring match on title OR description,
    /// newest releases first, capped at `limit`.
    fn search_releases(&self, query: &str, limit: usize) -> Result<Vec<Release>>;

    /// Case-insensitive substring match on track title, position ascending,
    /// capped at `limit`. Each hit carries its release's creator and
    /// creation time.
    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<TrackHit>>;

    fn get_release(&self, id: &str) -> Result<Option<Release>>;
    fn get_release_tracks(&self, release_id: &str) -> Result<Vec<ReleaseTrack>>;

    /// Every release id in the catalog, for full rebuilds.
    fn list_release_ids(&self) -> Result<Vec<String>>;

    fn create_release(&self, release: &Release, actor: Option<&str>) -> Result<()>;
    fn update_release(&self, release: &Release, actor: Option<&str>) -> Result<()>;
    fn delete_release(&self, id: &str, actor: Option<&str>) -> Result<bool>;

    fn create_track(&self, track: &ReleaseTrack, actor: Option<&str>) -> Result<()>;
    /// Bulk insert; may span multiple releases. Emits a single write event
    /// whose result rows carry every touched release id.
    fn create_tracks(&self, tracks: &[ReleaseTrack], actor: Option<&str>) -> Result<()>;
    fn update_track(&self, track: &ReleaseTrack, actor: Option<&str>) -> Result<()>;
    fn delete_track(&self, id: &str, actor: Option<&str>) -> Result<bool>;

    fn release_count(&self) -> Result<usize>;
    fn track_count(&self) -> Result<usize>;
}
