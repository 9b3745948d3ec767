use super::models::{ListenerProfile, ReleaseSignal, TrackSignal};
use anyhow::Result;
use std::collections::HashMap;

/// Read access to aggregated ranking signals and listener profiles.
///
/// Queries are parameterized by bounded id lists derived from already
/// fetched candidates, never by the full catalog. Ids without a row are
/// simply absent from the returned map.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait SignalStore: Send + Sync {
    fn release_signals(&self, release_ids: &[String]) -> Result<HashMap<String, ReleaseSignal>>;

    fn track_signals(&self, track_ids: &[String]) -> Result<HashMap<String, TrackSignal>>;

    /// `Ok(None)` means the listener has no profile (a normal condition);
    /// `Err` means the fetch itself failed.
    fn listener_profile(&self, user_id: &str) -> Result<Option<ListenerProfile>>;

    fn upsert_release_signal(&self, signal: &ReleaseSignal) -> Result<()>;
    fn upsert_track_signal(&self, signal: &TrackSignal) -> Result<()>;
    fn upsert_listener_profile(&self, profile: &ListenerProfile) -> Result<()>;
}
