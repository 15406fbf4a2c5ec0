use std::sync::Arc;

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{Channel, LikeOutcome, PassOutcome, Signal, SignalKind};
use crate::services::{InsertOutcome, Store};

/// Swipe ledger: records like/pass signals and materializes channels on mutual likes
///
/// Both invariants (one signal per ordered pair, one channel per unordered pair) are
/// enforced by the store's uniqueness guarantees. Losing a race is an expected outcome:
/// the ledger reads the winner's row and reports it.
#[derive(Clone)]
pub struct SwipeLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl SwipeLedger {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record Like(from -> to) and create the channel if the like is mutual
    ///
    /// Repeating a like is a no-op reported as `already_exists`; the mutual check still runs
    /// so a retry completes a match an earlier attempt did not finish.
    pub async fn record_like(&self, from: &str, to: &str) -> Result<LikeOutcome, AppError> {
        self.validate_pair(from, to).await?;

        let signal = self.signal(from, to, SignalKind::Like);
        let created = match self.store.insert_signal(&signal).await? {
            InsertOutcome::Inserted(_) => true,
            InsertOutcome::Existing(SignalKind::Like) => false,
            InsertOutcome::Existing(SignalKind::Pass) => {
                return Err(AppError::ConflictingSignal {
                    existing: SignalKind::Pass,
                })
            }
        };

        let channel = self.complete_match(from, to).await?;

        tracing::info!(
            "Like {} -> {} (created: {}, matched: {})",
            from,
            to,
            created,
            channel.is_some()
        );

        Ok(LikeOutcome {
            created,
            already_exists: !created,
            matched: channel.is_some(),
            channel_id: channel.map(|c| c.id),
        })
    }

    /// Record Pass(from -> to)
    pub async fn record_pass(&self, from: &str, to: &str) -> Result<PassOutcome, AppError> {
        self.validate_pair(from, to).await?;

        let signal = self.signal(from, to, SignalKind::Pass);
        let created = match self.store.insert_signal(&signal).await? {
            InsertOutcome::Inserted(_) => true,
            InsertOutcome::Existing(SignalKind::Pass) => false,
            InsertOutcome::Existing(SignalKind::Like) => {
                return Err(AppError::ConflictingSignal {
                    existing: SignalKind::Like,
                })
            }
        };

        tracing::info!("Pass {} -> {} (created: {})", from, to, created);

        Ok(PassOutcome {
            created,
            already_exists: !created,
        })
    }

    /// Hide `to` from `from`'s discovery. Idempotent.
    pub async fn block(&self, from: &str, to: &str) -> Result<bool, AppError> {
        if from == to {
            return Err(AppError::InvalidSelfAction);
        }

        let inserted = self.store.insert_block(from, to, self.clock.now()).await?;
        tracing::info!("Block {} -> {} (new: {})", from, to, inserted);
        Ok(inserted)
    }

    async fn validate_pair(&self, from: &str, to: &str) -> Result<(), AppError> {
        if from == to {
            return Err(AppError::InvalidSelfAction);
        }
        if self.store.get_profile(to).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", to)));
        }
        Ok(())
    }

    fn signal(&self, from: &str, to: &str, kind: SignalKind) -> Signal {
        Signal {
            from_user: from.to_string(),
            to_user: to.to_string(),
            kind,
            created_at: self.clock.now(),
        }
    }

    /// Create (or find) the channel for a pair if Like(to -> from) exists
    async fn complete_match(&self, from: &str, to: &str) -> Result<Option<Channel>, AppError> {
        if self.store.find_signal(to, from).await? != Some(SignalKind::Like) {
            return Ok(None);
        }

        let candidate = Channel::new(from, to, self.clock.now());
        let channel = match self.store.insert_channel(&candidate).await? {
            InsertOutcome::Inserted(channel) => {
                tracing::info!("Match created: {} <-> {} (channel {})", from, to, channel.id);
                channel
            }
            InsertOutcome::Existing(channel) => {
                tracing::debug!("Channel {} already existed for {} <-> {}", channel.id, from, to);
                channel
            }
        };

        Ok(Some(channel))
    }
}
