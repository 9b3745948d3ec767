pub mod scorer;
mod service;

pub use scorer::{
    CandidateKind, Personalization, PersonalizationReason, SignalBreakdown,
};
pub use service::{
    CatalogSearchService, PersonalizationSummary, RankedRelease, RankedTrack, SearchMeta,
    SearchRequest, SearchResponse, DEFAULT_REGION, DEFAULT_TAKE, MAX_TAKE,
};
