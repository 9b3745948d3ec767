//! Relevance scoring for catalog search candidates.
//!
//! Pure functions: raw signals plus an optional listener profile in, a
//! bounded composite score with its full breakdown out. No I/O, no clock
//! reads (callers pass `now`), no randomness.

use crate::signal_store::ListenerProfile;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Weights for the unboosted base score. They sum to 1.0.
pub const POPULARITY_WEIGHT: f64 = 0.6;
pub const RECENCY_WEIGHT: f64 = 0.3;
pub const EDITORIAL_WEIGHT: f64 = 0.1;

/// log10 compression divisor; normalized popularity saturates at 1.0
/// around one million plays.
const POPULARITY_LOG_DIVISOR: f64 = 6.0;

/// Editorial weights at or above this value saturate the boost at 1.0.
const EDITORIAL_CAP: f64 = 5.0;

/// Items older than this score zero recency.
const RECENCY_HORIZON_DAYS: f64 = 365.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// What kind of candidate is being scored. Track-level personalization
/// boosts weigh slightly less than release-level ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Release,
    Track,
}

impl CandidateKind {
    fn followed_creator_boost(&self) -> f64 {
        match self {
            CandidateKind::Release => 0.25,
            CandidateKind::Track => 0.20,
        }
    }

    fn favored_genre_boost(&self) -> f64 {
        match self {
            CandidateKind::Release => 0.15,
            CandidateKind::Track => 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonalizationReason {
    FollowedCreator,
    FavoredGenre,
}

/// Per-candidate signal breakdown. Every component is in [0, 1]; the
/// composite is the weighted sum times the personalization multiplier.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SignalBreakdown {
    pub popularity: f64,
    pub recency: f64,
    pub editorial: f64,
    pub composite: f64,
}

/// Personalization outcome for one candidate. Present whenever a listener
/// profile was available, even if nothing matched (then `applied` is false,
/// `multiplier` is exactly 1.0 and `reasons` is empty).
#[derive(Debug, Clone, Serialize)]
pub struct Personalization {
    pub applied: bool,
    pub reasons: Vec<PersonalizationReason>,
    pub matched_genres: Vec<String>,
    pub multiplier: f64,
}

/// Raw inputs for scoring one candidate. For tracks, `creator_id` and
/// `created_at` come from the owning release.
#[derive(Debug, Clone)]
pub struct ScoreInputs<'a> {
    pub kind: CandidateKind,
    pub play_count: f64,
    pub editorial_weight: f64,
    pub created_at: DateTime<Utc>,
    pub creator_id: &'a str,
    pub genres: &'a [String],
}

#[derive(Debug, Clone)]
pub struct Scored {
    pub breakdown: SignalBreakdown,
    pub personalization: Option<Personalization>,
}

/// Log-compressed play count, normalized into [0, 1].
pub fn popularity_score(play_count: f64) -> f64 {
    if !play_count.is_finite() || play_count <= 0.0 {
        return 0.0;
    }
    ((play_count + 1.0).log10() / POPULARITY_LOG_DIVISOR).min(1.0)
}

/// Linear decay from 1.0 (brand new) to 0.0 (a year old or more).
pub fn recency_score(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = ((now - created_at).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0);
    (1.0 - age_days.min(RECENCY_HORIZON_DAYS) / RECENCY_HORIZON_DAYS).max(0.0)
}

/// Curator-assigned weight, normalized into [0, 1].
pub fn editorial_boost(weight: f64) -> f64 {
    if !weight.is_finite() || weight <= 0.0 {
        return 0.0;
    }
    (weight / EDITORIAL_CAP).min(1.0)
}

/// Listener-specific multiplier. Boosts for the two conditions are
/// additive; both can apply to the same candidate.
pub fn personalize(
    kind: CandidateKind,
    creator_id: &str,
    genres: &[String],
    profile: &ListenerProfile,
) -> Personalization {
    let mut multiplier = 1.0;
    let mut reasons = Vec::new();
    let mut matched_genres = Vec::new();

    if profile.followed_creators.iter().any(|c| c == creator_id) {
        multiplier += kind.followed_creator_boost();
        reasons.push(PersonalizationReason::FollowedCreator);
    }

    for genre in genres {
        if profile.favorite_genres.iter().any(|g| g == genre) {
            matched_genres.push(genre.clone());
        }
    }
    if !matched_genres.is_empty() {
        multiplier += kind.favored_genre_boost();
        reasons.push(PersonalizationReason::FavoredGenre);
    }

    Personalization {
        applied: !reasons.is_empty(),
        reasons,
        matched_genres,
        multiplier,
    }
}

/// Score one candidate: weighted base times personalization multiplier.
pub fn score(inputs: &ScoreInputs, profile: Option<&ListenerProfile>, now: DateTime<Utc>) -> Scored {
    let popularity = popularity_score(inputs.play_count);
    let recency = recency_score(inputs.created_at, now);
    let editorial = editorial_boost(inputs.editorial_weight);

    let personalization =
        profile.map(|p| personalize(inputs.kind, inputs.creator_id, inputs.genres, p));
    let multiplier = personalization.as_ref().map_or(1.0, |p| p.multiplier);

    let base =
        popularity * POPULARITY_WEIGHT + recency * RECENCY_WEIGHT + editorial * EDITORIAL_WEIGHT;

    Scored {
        breakdown: SignalBreakdown {
            popularity,
            recency,
            editorial,
            composite: base * multiplier,
        },
        personalization,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile(genres: &[&str], creators: &[&str]) -> ListenerProfile {
        ListenerProfile {
            user_id: "u1".to_string(),
            favorite_genres: genres.iter().map(|s| s.to_string()).collect(),
            followed_creators: creators.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn inputs<'a>(
        kind: CandidateKind,
        play_count: f64,
        editorial_weight: f64,
        age_days: i64,
        creator_id: &'a str,
        genres: &'a [String],
        now: DateTime<Utc>,
    ) -> ScoreInputs<'a> {
        ScoreInputs {
            kind,
            play_count,
            editorial_weight,
            created_at: now - Duration::days(age_days),
            creator_id,
            genres,
        }
    }

    // ==========================================================================
    // Normalization bounds
    // ==========================================================================

    #[test]
    fn test_popularity_bounds() {
        for play_count in [0.0, 1.0, 120.0, 5000.0, 1e6, 1e12] {
            let score = popularity_score(play_count);
            assert!((0.0..=1.0).contains(&score), "out of bounds for {}", play_count);
        }
        assert_eq!(popularity_score(-5.0), 0.0);
        assert_eq!(popularity_score(f64::NAN), 0.0);
        assert_eq!(popularity_score(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_popularity_saturates_around_a_million_plays() {
        assert!(popularity_score(999_999.0) < 1.0 + 1e-9);
        assert_eq!(popularity_score(10_000_000.0), 1.0);
    }

    #[test]
    fn test_recency_bounds() {
        let now = Utc::now();
        for age_days in [0, 1, 100, 364, 365, 366, 5000] {
            let score = recency_score(now - Duration::days(age_days), now);
            assert!((0.0..=1.0).contains(&score), "out of bounds for {}", age_days);
        }
        // Items from the future clamp to full recency, not above.
        assert_eq!(recency_score(now + Duration::days(10), now), 1.0);
    }

    #[test]
    fn test_recency_edges() {
        let now = Utc::now();
        assert_eq!(recency_score(now, now), 1.0);
        assert_eq!(recency_score(now - Duration::days(365), now), 0.0);
        assert_eq!(recency_score(now - Duration::days(370), now), 0.0);
    }

    #[test]
    fn test_editorial_bounds() {
        assert_eq!(editorial_boost(0.0), 0.0);
        assert_eq!(editorial_boost(-3.0), 0.0);
        assert_eq!(editorial_boost(f64::NAN), 0.0);
        assert!((editorial_boost(2.0) - 0.4).abs() < 1e-9);
        assert_eq!(editorial_boost(5.0), 1.0);
        assert_eq!(editorial_boost(50.0), 1.0);
    }

    // ==========================================================================
    // Monotonicity
    // ==========================================================================

    #[test]
    fn test_popularity_is_monotonic_in_play_count() {
        let mut previous = popularity_score(0.0);
        for play_count in [1.0, 10.0, 100.0, 1e3, 1e4, 1e5, 1e6, 1e8] {
            let score = popularity_score(play_count);
            assert!(score >= previous, "dropped at {}", play_count);
            previous = score;
        }
    }

    #[test]
    fn test_recency_never_increases_with_age() {
        let now = Utc::now();
        let mut previous = recency_score(now, now);
        for age_days in [1, 30, 100, 200, 365, 400, 1000] {
            let score = recency_score(now - Duration::days(age_days), now);
            assert!(score <= previous, "rose at {} days", age_days);
            previous = score;
        }
    }

    // ==========================================================================
    // Personalization
    // ==========================================================================

    #[test]
    fn test_personalization_additivity_ordering() {
        let genres = vec!["afro".to_string()];
        let both = personalize(
            CandidateKind::Release,
            "creator-b",
            &genres,
            &profile(&["afro"], &["creator-b"]),
        );
        let creator_only = personalize(
            CandidateKind::Release,
            "creator-b",
            &genres,
            &profile(&["jazz"], &["creator-b"]),
        );
        let none = personalize(
            CandidateKind::Release,
            "creator-x",
            &genres,
            &profile(&["jazz"], &["creator-b"]),
        );

        assert!(both.multiplier > creator_only.multiplier);
        assert!(creator_only.multiplier > none.multiplier);
        assert_eq!(none.multiplier, 1.0);
        assert!(!none.applied);
        assert!(none.reasons.is_empty());
    }

    #[test]
    fn test_release_boost_values() {
        let genres = vec!["afro".to_string()];
        let both = personalize(
            CandidateKind::Release,
            "creator-b",
            &genres,
            &profile(&["afro"], &["creator-b"]),
        );
        assert!((both.multiplier - 1.40).abs() < 1e-9);
        assert_eq!(
            both.reasons,
            vec![
                PersonalizationReason::FollowedCreator,
                PersonalizationReason::FavoredGenre
            ]
        );
        assert_eq!(both.matched_genres, vec!["afro"]);
    }

    #[test]
    fn test_track_boosts_weigh_less_than_release_boosts() {
        let genres = vec!["afro".to_string()];
        let listener = profile(&["afro"], &["creator-b"]);
        let release = personalize(CandidateKind::Release, "creator-b", &genres, &listener);
        let track = personalize(CandidateKind::Track, "creator-b", &genres, &listener);

        assert!((track.multiplier - 1.30).abs() < 1e-9);
        assert!(track.multiplier < release.multiplier);
    }

    #[test]
    fn test_no_profile_means_no_personalization_payload() {
        let genres = vec!["afro".to_string()];
        let now = Utc::now();
        let scored = score(
            &inputs(CandidateKind::Release, 100.0, 0.0, 10, "c1", &genres, now),
            None,
            now,
        );
        assert!(scored.personalization.is_none());
    }

    #[test]
    fn test_profile_without_matches_reports_neutral_payload() {
        let genres = vec!["afro".to_string()];
        let now = Utc::now();
        let listener = profile(&["jazz"], &["creator-z"]);
        let scored = score(
            &inputs(CandidateKind::Release, 100.0, 0.0, 10, "c1", &genres, now),
            Some(&listener),
            now,
        );
        let personalization = scored.personalization.unwrap();
        assert!(!personalization.applied);
        assert_eq!(personalization.multiplier, 1.0);
        assert!(personalization.reasons.is_empty());
        assert!(personalization.matched_genres.is_empty());
    }

    // ==========================================================================
    // Composite
    // ==========================================================================

    #[test]
    fn test_weights_sum_to_one() {
        assert!((POPULARITY_WEIGHT + RECENCY_WEIGHT + EDITORIAL_WEIGHT - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_composite_formula() {
        let now = Utc::now();
        let genres: Vec<String> = vec![];
        let scored = score(
            &inputs(CandidateKind::Release, 5000.0, 2.0, 19, "c1", &genres, now),
            None,
            now,
        );
        let expected = popularity_score(5000.0) * POPULARITY_WEIGHT
            + recency_score(now - Duration::days(19), now) * RECENCY_WEIGHT
            + editorial_boost(2.0) * EDITORIAL_WEIGHT;
        assert!((scored.breakdown.composite - expected).abs() < 1e-12);
    }

    #[test]
    fn test_recent_popular_release_outscores_old_boosted_one() {
        // Release A: 5000 plays, weight 2, 19 days old.
        // Release B: 120 plays, weight 4, 370 days old.
        let now = Utc::now();
        let genres: Vec<String> = vec![];
        let a = score(
            &inputs(CandidateKind::Release, 5000.0, 2.0, 19, "ca", &genres, now),
            None,
            now,
        );
        let b = score(
            &inputs(CandidateKind::Release, 120.0, 4.0, 370, "cb", &genres, now),
            None,
            now,
        );
        assert!(a.breakdown.composite > b.breakdown.composite);
    }

    #[test]
    fn test_multiplier_scales_the_whole_base() {
        let now = Utc::now();
        let genres = vec!["afro".to_string()];
        let listener = profile(&[], &["creator-b"]);
        let boosted = score(
            &inputs(
                CandidateKind::Release,
                5000.0,
                2.0,
                19,
                "creator-b",
                &genres,
                now,
            ),
            Some(&listener),
            now,
        );
        let plain = score(
            &inputs(
                CandidateKind::Release,
                5000.0,
                2.0,
                19,
                "creator-b",
                &genres,
                now,
            ),
            None,
            now,
        );
        assert!((boosted.breakdown.composite - plain.breakdown.composite * 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_absent_signals_score_zero_but_keep_recency() {
        let now = Utc::now();
        let genres: Vec<String> = vec![];
        let scored = score(
            &inputs(CandidateKind::Release, 0.0, 0.0, 0, "c1", &genres, now),
            None,
            now,
        );
        assert_eq!(scored.breakdown.popularity, 0.0);
        assert_eq!(scored.breakdown.editorial, 0.0);
        assert_eq!(scored.breakdown.recency, 1.0);
        assert!((scored.breakdown.composite - RECENCY_WEIGHT).abs() < 1e-12);
    }
}
