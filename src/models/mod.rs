// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    canonical_pair, Candidate, CandidateQuery, Channel, Coordinates, Message, PhotoRecord, Profile,
    ScoreBreakdown, ScoredCandidate, Signal, SignalKind, GENDER_WILDCARD,
};
pub use requests::{BlockRequest, PostMessageRequest, SignalRequest, TypingQuery, TypingRequest, MAX_MESSAGE_CHARS};
pub use responses::{
    ChannelListResponse, ChannelSummary, DiscoveryResponse, ErrorResponse, HealthResponse,
    LikeOutcome, MessageListResponse, MessagePreview, PassOutcome, TypingResponse,
};
