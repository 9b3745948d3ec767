use super::scorer::{self, CandidateKind, Personalization, PersonalizationReason, SignalBreakdown};
use crate::catalog_store::{CatalogStore, Release, ReleaseTrack};
use crate::server::metrics;
use crate::signal_store::{ListenerProfile, SignalStore};
use crate::telemetry::{EventContext, Telemetry};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_TAKE: usize = 20;
pub const MAX_TAKE: usize = 50;
pub const DEFAULT_REGION: &str = "global";

/// A validated search request. Boundary validation (`take` caps) happens in
/// the HTTP layer; the service assumes sane inputs.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub release_take: usize,
    pub track_take: usize,
    pub region: String,
    pub personalized: bool,
    pub user_id: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            release_take: DEFAULT_TAKE,
            track_take: DEFAULT_TAKE,
            region: DEFAULT_REGION.to_string(),
            personalized: false,
            user_id: None,
        }
    }

    pub fn personalized_for(mut self, user_id: impl Into<String>) -> Self {
        self.personalized = true;
        self.user_id = Some(user_id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedRelease {
    #[serde(flatten)]
    pub release: Release,
    pub play_count: u64,
    pub genres: Vec<String>,
    pub trending_regions: Vec<String>,
    pub score: SignalBreakdown,
    pub personalization: Option<Personalization>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedTrack {
    #[serde(flatten)]
    pub track: ReleaseTrack,
    pub play_count: u64,
    pub genres: Vec<String>,
    pub score: SignalBreakdown,
    pub personalization: Option<Personalization>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalizationSummary {
    pub requested: bool,
    /// True iff a listener profile was actually loaded for this search.
    pub applied: bool,
    pub profile_unavailable: bool,
    /// How many returned releases matched each reason.
    pub followed_creator_matches: usize,
    pub favored_genre_matches: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchMeta {
    pub query: String,
    pub region: String,
    pub personalization: PersonalizationSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub releases: Vec<RankedRelease>,
    pub tracks: Vec<RankedTrack>,
    pub meta: SearchMeta,
}

/// Orchestrates a catalog search: candidate fetch, signal fetch, optional
/// profile fetch, scoring, ranking and response assembly.
///
/// Only candidate-fetch failures propagate. Personalization and telemetry
/// are best-effort and degrade to flags in the response metadata.
pub struct CatalogSearchService {
    catalog: Arc<dyn CatalogStore>,
    signals: Arc<dyn SignalStore>,
    telemetry: Telemetry,
}

impl CatalogSearchService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        signals: Arc<dyn SignalStore>,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            catalog,
            signals,
            telemetry,
        }
    }

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let now = Utc::now();
        let request_id = Uuid::new_v4().to_string();

        // 1. Bounded candidate fetch. This is the only critical-path query;
        //    its failure fails the search.
        let release_candidates = self
            .catalog
            .search_releases(&request.query, request.release_take)
            .context("Failed to fetch release candidates")?;
        let track_candidates = self
            .catalog
            .search_tracks(&request.query, request.track_take)
            .context("Failed to fetch track candidates")?;

        // 2. Signals for exactly the candidate ids.
        let release_ids: Vec<String> = release_candidates.iter().map(|r| r.id.clone()).collect();
        let track_ids: Vec<String> = track_candidates
            .iter()
            .map(|t| t.track.id.clone())
            .collect();
        let release_signals = self.signals.release_signals(&release_ids).unwrap_or_else(|e| {
            warn!("Release signal fetch failed, scoring at zero: {:#}", e);
            Default::default()
        });
        let track_signals = self.signals.track_signals(&track_ids).unwrap_or_else(|e| {
            warn!("Track signal fetch failed, scoring at zero: {:#}", e);
            Default::default()
        });

        // 3. Listener profile, degraded on failure.
        let mut profile_unavailable = false;
        let profile: Option<ListenerProfile> = match (&request.user_id, request.personalized) {
            (Some(user_id), true) => match self.signals.listener_profile(user_id) {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(
                        "Profile fetch failed for {}, searching un-personalized: {:#}",
                        user_id, e
                    );
                    profile_unavailable = true;
                    None
                }
            },
            _ => None,
        };

        // 4. Score and rank. The sort is stable so tied composites keep
        //    candidate fetch order.
        let mut releases: Vec<RankedRelease> = release_candidates
            .into_iter()
            .map(|release| {
                let signal = release_signals.get(&release.id);
                let genres = signal.map(|s| s.genres.clone()).unwrap_or_default();
                let scored = scorer::score(
                    &scorer::ScoreInputs {
                        kind: CandidateKind::Release,
                        play_count: signal.map_or(0.0, |s| s.play_count as f64),
                        editorial_weight: signal.map_or(0.0, |s| s.editorial_weight as f64),
                        created_at: release.created_at,
                        creator_id: &release.creator_id,
                        genres: &genres,
                    },
                    profile.as_ref(),
                    now,
                );
                RankedRelease {
                    play_count: signal.map_or(0, |s| s.play_count),
                    trending_regions: signal.map(|s| s.trending_regions.clone()).unwrap_or_default(),
                    genres,
                    score: scored.breakdown,
                    personalization: scored.personalization,
                    release,
                }
            })
            .collect();
        releases.sort_by(|a, b| {
            b.score
                .composite
                .partial_cmp(&a.score.composite)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut tracks: Vec<RankedTrack> = track_candidates
            .into_iter()
            .map(|hit| {
                let signal = track_signals.get(&hit.track.id);
                let genres = signal.map(|s| s.genres.clone()).unwrap_or_default();
                let scored = scorer::score(
                    &scorer::ScoreInputs {
                        kind: CandidateKind::Track,
                        play_count: signal.map_or(0.0, |s| s.play_count as f64),
                        editorial_weight: signal.map_or(0.0, |s| s.editorial_weight as f64),
                        created_at: hit.release_created_at,
                        creator_id: &hit.release_creator_id,
                        genres: &genres,
                    },
                    profile.as_ref(),
                    now,
                );
                RankedTrack {
                    play_count: signal.map_or(0, |s| s.play_count),
                    genres,
                    score: scored.breakdown,
                    personalization: scored.personalization,
                    track: hit.track,
                }
            })
            .collect();
        tracks.sort_by(|a, b| {
            b.score
                .composite
                .partial_cmp(&a.score.composite)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // 5. Metadata.
        let followed_creator_matches = count_reason(&releases, PersonalizationReason::FollowedCreator);
        let favored_genre_matches = count_reason(&releases, PersonalizationReason::FavoredGenre);
        let meta = SearchMeta {
            query: request.query.clone(),
            region: request.region.clone(),
            personalization: PersonalizationSummary {
                requested: request.personalized,
                applied: profile.is_some(),
                profile_unavailable,
                followed_creator_matches,
                favored_genre_matches,
            },
        };

        let response = SearchResponse {
            releases,
            tracks,
            meta,
        };

        self.emit_events(request, &response, &request_id);
        metrics::record_search(
            request.personalized,
            response.meta.personalization.applied,
            started.elapsed(),
        );

        Ok(response)
    }

    fn emit_events(&self, request: &SearchRequest, response: &SearchResponse, request_id: &str) {
        let summary = &response.meta.personalization;
        let metadata = json!({
            "query": request.query,
            "region": request.region,
            "release_results": response.releases.len(),
            "track_results": response.tracks.len(),
            "personalization_requested": summary.requested,
            "personalization_applied": summary.applied,
            "profile_unavailable": summary.profile_unavailable,
        });
        let ctx = EventContext::default()
            .with_actor(request.user_id.as_deref())
            .with_request_id(request_id);

        self.telemetry
            .audit("search.performed", metadata.clone(), ctx.clone());
        self.telemetry.track("search.performed", metadata, ctx.clone());

        if summary.applied {
            self.telemetry.track(
                "search.personalization_applied",
                json!({
                    "followed_creator_matches": summary.followed_creator_matches,
                    "favored_genre_matches": summary.favored_genre_matches,
                }),
                ctx.clone(),
            );
        }
        if summary.requested && summary.profile_unavailable {
            self.telemetry
                .track("search.personalization_unavailable", json!({}), ctx);
        }
    }
}

fn count_reason(releases: &[RankedRelease], reason: PersonalizationReason) -> usize {
    releases
        .iter()
        .filter(|r| {
            r.personalization
                .as_ref()
                .is_some_and(|p| p.reasons.contains(&reason))
        })
        .count()
}
