use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_REGION: &str = "global";

/// Why a refresh was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshReason {
    ReleaseMutated,
    TrackMutated,
    ManualRebuild,
}

impl RefreshReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshReason::ReleaseMutated => "release-mutated",
            RefreshReason::TrackMutated => "track-mutated",
            RefreshReason::ManualRebuild => "manual-rebuild",
        }
    }
}

impl std::fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters for scheduling one refresh. `regions: None` means the
/// global region.
#[derive(Debug, Clone)]
pub struct ScheduleRefresh {
    pub release_id: String,
    pub regions: Option<Vec<String>>,
    pub reason: RefreshReason,
    pub triggered_by: Option<String>,
}

impl ScheduleRefresh {
    pub fn new(release_id: impl Into<String>, reason: RefreshReason) -> Self {
        Self {
            release_id: release_id.into(),
            regions: None,
            reason,
            triggered_by: None,
        }
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_trigger(mut self, actor: Option<&str>) -> Self {
        self.triggered_by = actor.map(str::to_string);
        self
    }
}

/// One deduplicated unit of "recompute ranking signals for this release in
/// these regions". Lives only in memory; a restart loses pending tasks and
/// the full-rebuild path compensates.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshTask {
    pub release_id: String,
    /// Deduplicated and sorted alphabetically.
    pub regions: Vec<String>,
    pub reason: RefreshReason,
    pub scheduled_at: DateTime<Utc>,
    pub triggered_by: Option<String>,
}

impl RefreshTask {
    pub fn from_params(params: ScheduleRefresh, scheduled_at: DateTime<Utc>) -> Self {
        let mut regions = params
            .regions
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_REGION.to_string()]);
        regions.sort();
        regions.dedup();

        Self {
            release_id: params.release_id,
            regions,
            reason: params.reason,
            scheduled_at,
            triggered_by: params.triggered_by,
        }
    }

    /// Queue identity: same release, same region set, same reason collide,
    /// and the later task replaces the earlier one.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.release_id,
            self.regions.join(","),
            self.reason
        )
    }
}
