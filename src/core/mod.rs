// Core algorithm exports
pub mod distance;
pub mod exclusion;
pub mod filters;
pub mod ledger;
pub mod messages;
pub mod ranker;
pub mod scoring;

pub use distance::{distance_band, distance_km, format_distance, haversine_distance};
pub use exclusion::ExclusionSet;
pub use filters::{matches_candidate_query, matches_reciprocal_interest, matches_viewer_preference};
pub use ledger::SwipeLedger;
pub use messages::MessageStore;
pub use ranker::{CandidateRanker, Discovery, RankerSettings};
pub use scoring::{interest_overlap, score_candidate, select_best, tag_overlap, TagOverlap};
