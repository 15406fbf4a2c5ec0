use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CandidateQuery, Channel, Message, Profile, Signal, SignalKind};

/// Errors that can occur when talking to the durable store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation {operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result of an insert guarded by a uniqueness constraint
///
/// `Existing` is not a failure: it carries the row written by whichever writer got there
/// first, so callers can report the winner's result.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome<T> {
    Inserted(T),
    Existing(T),
}

impl<T> InsertOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            InsertOutcome::Inserted(value) | InsertOutcome::Existing(value) => value,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// A channel and the time of its latest activity (last message, else creation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelActivity {
    pub channel_id: Uuid,
    pub at: DateTime<Utc>,
}

/// Durable store behind discovery, the swipe ledger and conversations
///
/// Implementations must enforce two uniqueness guarantees:
/// - one signal per ordered `(from_user, to_user)` pair, whatever its kind
/// - one channel per canonical `(user_a, user_b)` pair
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError>;

    /// Display names for the given users; unknown ids are omitted
    async fn display_names(&self, user_ids: &[String]) -> Result<HashMap<String, String>, StoreError>;

    /// Structured interest references attached to a profile
    async fn interest_refs(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    /// Bounded candidate window, most recently created profiles first
    async fn candidate_window(&self, query: &CandidateQuery) -> Result<Vec<Profile>, StoreError>;

    /// Every user the given user has liked or passed
    async fn outgoing_signal_targets(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    async fn blocked_users(&self, user_id: &str) -> Result<Vec<String>, StoreError>;

    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, StoreError>;

    /// Returns `false` if the block already existed
    async fn insert_block(
        &self,
        blocker_id: &str,
        blocked_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Insert a signal; `Existing` carries the kind already recorded for the ordered pair
    async fn insert_signal(&self, signal: &Signal) -> Result<InsertOutcome<SignalKind>, StoreError>;

    async fn find_signal(&self, from_user: &str, to_user: &str) -> Result<Option<SignalKind>, StoreError>;

    /// Insert a channel; `Existing` carries the channel already recorded for the pair
    async fn insert_channel(&self, channel: &Channel) -> Result<InsertOutcome<Channel>, StoreError>;

    async fn get_channel(&self, channel_id: Uuid) -> Result<Option<Channel>, StoreError>;

    async fn find_channel_between(&self, first: &str, second: &str) -> Result<Option<Channel>, StoreError>;

    /// Channels involving the user, most recently active first
    async fn channels_for(&self, user_id: &str) -> Result<Vec<Channel>, StoreError>;

    /// The user's channels whose latest activity is after `since`
    async fn channel_activity_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChannelActivity>, StoreError>;

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;

    async fn set_last_message(
        &self,
        channel_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError>;

    /// All messages of a channel, oldest first
    async fn messages(&self, channel_id: Uuid) -> Result<Vec<Message>, StoreError>;

    /// Messages created strictly after `after`, oldest first
    async fn messages_after(
        &self,
        channel_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Vec<Message>, StoreError>;

    /// Mark unread messages not sent by `reader` as read; returns how many flipped
    async fn mark_read(
        &self,
        channel_id: Uuid,
        reader_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn unread_count(&self, channel_id: Uuid, reader_id: &str) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}

/// Store decorator that bounds every call with a timeout
pub struct TimeoutStore {
    inner: Arc<dyn Store>,
    timeout: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn Store>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                let after_ms = self.timeout.as_millis() as u64;
                tracing::warn!("Store operation {} timed out after {}ms", operation, after_ms);
                Err(StoreError::Timeout { operation, after_ms })
            }
        }
    }
}

#[async_trait]
impl Store for TimeoutStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        self.bounded("get_profile", self.inner.get_profile(user_id)).await
    }

    async fn display_names(&self, user_ids: &[String]) -> Result<HashMap<String, String>, StoreError> {
        self.bounded("display_names", self.inner.display_names(user_ids)).await
    }

    async fn interest_refs(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        self.bounded("interest_refs", self.inner.interest_refs(user_id)).await
    }

    async fn candidate_window(&self, query: &CandidateQuery) -> Result<Vec<Profile>, StoreError> {
        self.bounded("candidate_window", self.inner.candidate_window(query)).await
    }

    async fn outgoing_signal_targets(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        self.bounded("outgoing_signal_targets", self.inner.outgoing_signal_targets(user_id))
            .await
    }

    async fn blocked_users(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        self.bounded("blocked_users", self.inner.blocked_users(user_id)).await
    }

    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, StoreError> {
        self.bounded("is_blocked", self.inner.is_blocked(blocker_id, blocked_id))
            .await
    }

    async fn insert_block(
        &self,
        blocker_id: &str,
        blocked_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.bounded("insert_block", self.inner.insert_block(blocker_id, blocked_id, at))
            .await
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<InsertOutcome<SignalKind>, StoreError> {
        self.bounded("insert_signal", self.inner.insert_signal(signal)).await
    }

    async fn find_signal(&self, from_user: &str, to_user: &str) -> Result<Option<SignalKind>, StoreError> {
        self.bounded("find_signal", self.inner.find_signal(from_user, to_user))
            .await
    }

    async fn insert_channel(&self, channel: &Channel) -> Result<InsertOutcome<Channel>, StoreError> {
        self.bounded("insert_channel", self.inner.insert_channel(channel)).await
    }

    async fn get_channel(&self, channel_id: Uuid) -> Result<Option<Channel>, StoreError> {
        self.bounded("get_channel", self.inner.get_channel(channel_id)).await
    }

    async fn find_channel_between(&self, first: &str, second: &str) -> Result<Option<Channel>, StoreError> {
        self.bounded("find_channel_between", self.inner.find_channel_between(first, second))
            .await
    }

    async fn channels_for(&self, user_id: &str) -> Result<Vec<Channel>, StoreError> {
        self.bounded("channels_for", self.inner.channels_for(user_id)).await
    }

    async fn channel_activity_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChannelActivity>, StoreError> {
        self.bounded(
            "channel_activity_since",
            self.inner.channel_activity_since(user_id, since),
        )
        .await
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.bounded("insert_message", self.inner.insert_message(message)).await
    }

    async fn set_last_message(
        &self,
        channel_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.bounded("set_last_message", self.inner.set_last_message(channel_id, message_id, at))
            .await
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError> {
        self.bounded("get_message", self.inner.get_message(message_id)).await
    }

    async fn messages(&self, channel_id: Uuid) -> Result<Vec<Message>, StoreError> {
        self.bounded("messages", self.inner.messages(channel_id)).await
    }

    async fn messages_after(
        &self,
        channel_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Vec<Message>, StoreError> {
        self.bounded("messages_after", self.inner.messages_after(channel_id, after))
            .await
    }

    async fn mark_read(
        &self,
        channel_id: Uuid,
        reader_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.bounded("mark_read", self.inner.mark_read(channel_id, reader_id, at))
            .await
    }

    async fn unread_count(&self, channel_id: Uuid, reader_id: &str) -> Result<u64, StoreError> {
        self.bounded("unread_count", self.inner.unread_count(channel_id, reader_id))
            .await
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        self.bounded("health_check", self.inner.health_check()).await
    }
}
