use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::Clock;

type Marks = HashMap<Uuid, HashMap<String, DateTime<Utc>>>;

/// Ephemeral typing indicators, keyed by channel
///
/// Marks live in process memory only: on a multi-node deployment a mark is visible
/// only to clients served by the node that received it. Membership is checked by callers.
pub struct PresenceBoard {
    marks: Mutex<Marks>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
}

impl PresenceBoard {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            marks: Mutex::new(HashMap::new()),
            clock,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Marks> {
        self.marks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - at < self.ttl
    }

    /// Mark `user_id` as typing in `channel_id` as of now
    pub fn set_typing(&self, channel_id: Uuid, user_id: &str) {
        let now = self.clock.now();
        self.lock()
            .entry(channel_id)
            .or_default()
            .insert(user_id.to_string(), now);
    }

    pub fn clear_typing(&self, channel_id: Uuid, user_id: &str) {
        let mut marks = self.lock();
        if let Some(channel) = marks.get_mut(&channel_id) {
            channel.remove(user_id);
            if channel.is_empty() {
                marks.remove(&channel_id);
            }
        }
    }

    /// Users currently typing in the channel, other than `excluding`, sorted
    pub fn who_is_typing(&self, channel_id: Uuid, excluding: &str) -> Vec<String> {
        let now = self.clock.now();
        let marks = self.lock();

        let mut typing: Vec<String> = marks
            .get(&channel_id)
            .map(|channel| {
                channel
                    .iter()
                    .filter(|(user, at)| user.as_str() != excluding && self.is_fresh(**at, now))
                    .map(|(user, _)| user.clone())
                    .collect()
            })
            .unwrap_or_default();

        typing.sort();
        typing
    }

    /// Drop expired marks; returns how many were removed
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut marks = self.lock();
        let mut removed = 0;

        marks.retain(|_, channel| {
            let before = channel.len();
            channel.retain(|_, at| self.is_fresh(*at, now));
            removed += before - channel.len();
            !channel.is_empty()
        });

        removed
    }

    /// Run `sweep` every `interval` until `cancel` fires
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep();
                        if removed > 0 {
                            tracing::debug!("Presence sweep removed {} expired typing marks", removed);
                        }
                    }
                }
            }

            tracing::info!("Presence sweeper stopped");
        })
    }
}
