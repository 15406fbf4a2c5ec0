use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::filters::matches_candidate_query;
use crate::models::{canonical_pair, CandidateQuery, Channel, Message, Profile, Signal, SignalKind};
use crate::services::store::{ChannelActivity, InsertOutcome, Store, StoreError};

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<String, Profile>,
    interests: HashMap<String, Vec<String>>,
    blocks: HashSet<(String, String)>,
    signals: HashMap<(String, String), Signal>,
    channels: HashMap<Uuid, Channel>,
    channel_pairs: HashMap<(String, String), Uuid>,
    messages: HashMap<Uuid, Vec<Message>>,
}

/// In-process store with the same uniqueness guarantees as the Postgres schema
///
/// Each operation runs under a single lock, so an insert and its uniqueness check are atomic.
/// Used for tests and for running the service without a database.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile
    pub async fn upsert_profile(&self, profile: Profile) {
        let mut state = self.state.write().await;
        state.profiles.insert(profile.user_id.clone(), profile);
    }

    pub async fn set_interests(&self, user_id: &str, interests: Vec<String>) {
        let mut state = self.state.write().await;
        state.interests.insert(user_id.to_string(), interests);
    }

    /// Simulate an unreachable backend
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Delay every operation, e.g. to exercise timeouts
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    async fn check(&self) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

fn sort_by_activity(channels: &mut [Channel]) {
    channels.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        self.check().await?;
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }

    async fn display_names(&self, user_ids: &[String]) -> Result<HashMap<String, String>, StoreError> {
        self.check().await?;
        let state = self.state.read().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| {
                state
                    .profiles
                    .get(id)
                    .map(|p| (id.clone(), p.display_name.clone()))
            })
            .collect())
    }

    async fn interest_refs(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        self.check().await?;
        Ok(self
            .state
            .read()
            .await
            .interests
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn candidate_window(&self, query: &CandidateQuery) -> Result<Vec<Profile>, StoreError> {
        self.check().await?;
        let state = self.state.read().await;
        let mut window: Vec<Profile> = state
            .profiles
            .values()
            .filter(|p| matches_candidate_query(p, query))
            .cloned()
            .collect();

        window.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        window.truncate(query.limit);
        Ok(window)
    }

    async fn outgoing_signal_targets(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        self.check().await?;
        let state = self.state.read().await;
        Ok(state
            .signals
            .keys()
            .filter(|(from, _)| from == user_id)
            .map(|(_, to)| to.clone())
            .collect())
    }

    async fn blocked_users(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        self.check().await?;
        let state = self.state.read().await;
        Ok(state
            .blocks
            .iter()
            .filter(|(blocker, _)| blocker == user_id)
            .map(|(_, blocked)| blocked.clone())
            .collect())
    }

    async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> Result<bool, StoreError> {
        self.check().await?;
        let key = (blocker_id.to_string(), blocked_id.to_string());
        Ok(self.state.read().await.blocks.contains(&key))
    }

    async fn insert_block(
        &self,
        blocker_id: &str,
        blocked_id: &str,
        _at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check().await?;
        let mut state = self.state.write().await;
        Ok(state
            .blocks
            .insert((blocker_id.to_string(), blocked_id.to_string())))
    }

    async fn insert_signal(&self, signal: &Signal) -> Result<InsertOutcome<SignalKind>, StoreError> {
        self.check().await?;
        let mut state = self.state.write().await;
        let key = (signal.from_user.clone(), signal.to_user.clone());
        if let Some(existing) = state.signals.get(&key) {
            return Ok(InsertOutcome::Existing(existing.kind));
        }
        state.signals.insert(key, signal.clone());
        Ok(InsertOutcome::Inserted(signal.kind))
    }

    async fn find_signal(&self, from_user: &str, to_user: &str) -> Result<Option<SignalKind>, StoreError> {
        self.check().await?;
        let key = (from_user.to_string(), to_user.to_string());
        Ok(self.state.read().await.signals.get(&key).map(|s| s.kind))
    }

    async fn insert_channel(&self, channel: &Channel) -> Result<InsertOutcome<Channel>, StoreError> {
        self.check().await?;
        let mut state = self.state.write().await;
        let pair = canonical_pair(&channel.user_a, &channel.user_b);
        if let Some(existing) = state
            .channel_pairs
            .get(&pair)
            .and_then(|id| state.channels.get(id))
        {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        state.channel_pairs.insert(pair, channel.id);
        state.channels.insert(channel.id, channel.clone());
        Ok(InsertOutcome::Inserted(channel.clone()))
    }

    async fn get_channel(&self, channel_id: Uuid) -> Result<Option<Channel>, StoreError> {
        self.check().await?;
        Ok(self.state.read().await.channels.get(&channel_id).cloned())
    }

    async fn find_channel_between(&self, first: &str, second: &str) -> Result<Option<Channel>, StoreError> {
        self.check().await?;
        let state = self.state.read().await;
        let pair = canonical_pair(first, second);
        Ok(state
            .channel_pairs
            .get(&pair)
            .and_then(|id| state.channels.get(id))
            .cloned())
    }

    async fn channels_for(&self, user_id: &str) -> Result<Vec<Channel>, StoreError> {
        self.check().await?;
        let state = self.state.read().await;
        let mut channels: Vec<Channel> = state
            .channels
            .values()
            .filter(|c| c.has_member(user_id))
            .cloned()
            .collect();
        sort_by_activity(&mut channels);
        Ok(channels)
    }

    async fn channel_activity_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ChannelActivity>, StoreError> {
        self.check().await?;
        let state = self.state.read().await;
        Ok(state
            .channels
            .values()
            .filter(|c| c.has_member(user_id) && c.last_activity() > since)
            .map(|c| ChannelActivity {
                channel_id: c.id,
                at: c.last_activity(),
            })
            .collect())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.check().await?;
        let mut state = self.state.write().await;
        state
            .messages
            .entry(message.channel_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn set_last_message(
        &self,
        channel_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check().await?;
        let mut state = self.state.write().await;
        // A slower writer with an older message must not move the pointer back
        if let Some(channel) = state.channels.get_mut(&channel_id) {
            if channel.last_message_at.map_or(true, |current| current <= at) {
                channel.last_message_id = Some(message_id);
                channel.last_message_at = Some(at);
            }
        }
        Ok(())
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError> {
        self.check().await?;
        let state = self.state.read().await;
        Ok(state
            .messages
            .values()
            .flatten()
            .find(|m| m.id == message_id)
            .cloned())
    }

    async fn messages(&self, channel_id: Uuid) -> Result<Vec<Message>, StoreError> {
        self.check().await?;
        let state = self.state.read().await;
        let mut messages = state.messages.get(&channel_id).cloned().unwrap_or_default();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn messages_after(
        &self,
        channel_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<Vec<Message>, StoreError> {
        let mut messages = self.messages(channel_id).await?;
        messages.retain(|m| m.created_at > after);
        Ok(messages)
    }

    async fn mark_read(
        &self,
        channel_id: Uuid,
        reader_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.check().await?;
        let mut state = self.state.write().await;
        let mut flipped = 0;
        if let Some(messages) = state.messages.get_mut(&channel_id) {
            for message in messages
                .iter_mut()
                .filter(|m| m.sender_id != reader_id && !m.read)
            {
                message.read = true;
                message.read_at = Some(at);
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn unread_count(&self, channel_id: Uuid, reader_id: &str) -> Result<u64, StoreError> {
        self.check().await?;
        let state = self.state.read().await;
        Ok(state
            .messages
            .get(&channel_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| m.sender_id != reader_id && !m.read)
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        self.check().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn like(from: &str, to: &str) -> Signal {
        Signal {
            from_user: from.to_string(),
            to_user: to.to_string(),
            kind: SignalKind::Like,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_signal_pair_is_unique_across_kinds() {
        let store = MemoryStore::new();
        assert_eq!(
            store.insert_signal(&like("a", "b")).await.unwrap(),
            InsertOutcome::Inserted(SignalKind::Like)
        );

        let mut pass = like("a", "b");
        pass.kind = SignalKind::Pass;
        assert_eq!(
            store.insert_signal(&pass).await.unwrap(),
            InsertOutcome::Existing(SignalKind::Like)
        );

        // The reverse direction is a different pair
        assert!(store.insert_signal(&like("b", "a")).await.unwrap().was_inserted());
    }

    #[tokio::test]
    async fn test_channel_pair_is_unordered() {
        let store = MemoryStore::new();
        let first = Channel::new("a", "b", Utc::now());
        let second = Channel::new("b", "a", Utc::now());

        assert!(store.insert_channel(&first).await.unwrap().was_inserted());
        let outcome = store.insert_channel(&second).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Existing(first.clone()));
        assert_eq!(store.channels_for("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_last_message_pointer_never_moves_back() {
        let store = MemoryStore::new();
        let created = Utc::now();
        let channel = Channel::new("a", "b", created);
        store.insert_channel(&channel).await.unwrap();

        let newer = Uuid::new_v4();
        let older = Uuid::new_v4();
        store
            .set_last_message(channel.id, newer, created + chrono::Duration::seconds(2))
            .await
            .unwrap();
        store
            .set_last_message(channel.id, older, created + chrono::Duration::seconds(1))
            .await
            .unwrap();

        let stored = store.get_channel(channel.id).await.unwrap().unwrap();
        assert_eq!(stored.last_message_id, Some(newer));
        assert_eq!(stored.last_message_at, Some(created + chrono::Duration::seconds(2)));
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.blocked_users("a").await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
