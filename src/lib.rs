//! Kindred - discovery, mutual matching and live conversations
//!
//! This library provides the core of a mutual-match app: candidate discovery with
//! scoring, an idempotent like/pass ledger that opens a channel on mutual likes,
//! channel messaging, and polling-backed realtime streams with typing presence.

pub mod auth;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{CandidateRanker, Discovery, ExclusionSet, MessageStore, SwipeLedger};
pub use error::AppError;
pub use models::{Candidate, Channel, Message, Profile, Signal, SignalKind};
