use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::Message;
use crate::services::{ChannelActivity, Store};

/// An event pushed to a connected client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Ping {
        timestamp: DateTime<Utc>,
    },
    Refresh {
        count: u64,
        #[serde(rename = "checkedAt")]
        checked_at: DateTime<Utc>,
    },
    Messages {
        #[serde(rename = "channelId")]
        channel_id: Uuid,
        messages: Vec<Message>,
    },
}

impl StreamEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Ping { .. } => "ping",
            StreamEvent::Refresh { .. } => "refresh",
            StreamEvent::Messages { .. } => "messages",
        }
    }
}

/// Source of change notifications polled by a [`StreamDriver`]
#[async_trait]
pub trait Watcher: Send {
    fn name(&self) -> &'static str;

    /// Check for changes since the last successful poll
    ///
    /// Returns `None` when there is nothing to emit. A failed poll must leave the
    /// watcher's position unchanged so the next tick retries the same range.
    async fn poll(&mut self) -> Result<Option<StreamEvent>, AppError>;
}

/// How far behind its watermark a watcher re-reads
///
/// Rows are stamped before their insert commits, so a row can become visible after a poll
/// whose watermark already passed its timestamp. Keep this above the store timeout.
pub const DEFAULT_LATE_COMMIT_WINDOW: Duration = Duration::from_secs(30);

fn lookback(window: Duration) -> chrono::Duration {
    chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Watches the viewer's match list for new or updated channels
pub struct MatchListWatcher {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    user_id: String,
    opened_at: DateTime<Utc>,
    since: DateTime<Utc>,
    window: chrono::Duration,
    reported: HashSet<ChannelActivity>,
}

impl MatchListWatcher {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, user_id: impl Into<String>) -> Self {
        let opened_at = clock.now();
        Self {
            store,
            clock,
            user_id: user_id.into(),
            opened_at,
            since: opened_at,
            window: lookback(DEFAULT_LATE_COMMIT_WINDOW),
            reported: HashSet::new(),
        }
    }

    pub fn with_late_commit_window(mut self, window: Duration) -> Self {
        self.window = lookback(window);
        self
    }

    /// Lower bound of the next read: one window behind `since`, never before the stream opened
    fn floor(&self) -> DateTime<Utc> {
        (self.since - self.window).max(self.opened_at)
    }
}

#[async_trait]
impl Watcher for MatchListWatcher {
    fn name(&self) -> &'static str {
        "match_list"
    }

    async fn poll(&mut self) -> Result<Option<StreamEvent>, AppError> {
        let checked_at = self.clock.now();
        let activity = self
            .store
            .channel_activity_since(&self.user_id, self.floor())
            .await?;
        self.since = checked_at;

        let count = activity
            .into_iter()
            .filter(|entry| self.reported.insert(*entry))
            .count() as u64;

        let floor = self.floor();
        self.reported.retain(|entry| entry.at > floor);

        Ok((count > 0).then_some(StreamEvent::Refresh { count, checked_at }))
    }
}

/// Watches one channel for new messages
pub struct ConversationWatcher {
    store: Arc<dyn Store>,
    channel_id: Uuid,
    opened_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    window: chrono::Duration,
    delivered: HashMap<Uuid, DateTime<Utc>>,
}

impl ConversationWatcher {
    /// Start watching for messages created after `since`
    pub fn new(store: Arc<dyn Store>, channel_id: Uuid, since: DateTime<Utc>) -> Self {
        Self {
            store,
            channel_id,
            opened_at: since,
            last_seen: since,
            window: lookback(DEFAULT_LATE_COMMIT_WINDOW),
            delivered: HashMap::new(),
        }
    }

    pub fn with_late_commit_window(mut self, window: Duration) -> Self {
        self.window = lookback(window);
        self
    }

    fn floor(&self) -> DateTime<Utc> {
        (self.last_seen - self.window).max(self.opened_at)
    }
}

#[async_trait]
impl Watcher for ConversationWatcher {
    fn name(&self) -> &'static str {
        "conversation"
    }

    async fn poll(&mut self) -> Result<Option<StreamEvent>, AppError> {
        let fetched = self
            .store
            .messages_after(self.channel_id, self.floor())
            .await?;

        let messages: Vec<Message> = fetched
            .into_iter()
            .filter(|m| !self.delivered.contains_key(&m.id))
            .collect();

        let Some(newest) = messages.iter().map(|m| m.created_at).max() else {
            return Ok(None);
        };
        self.last_seen = self.last_seen.max(newest);
        self.delivered.extend(messages.iter().map(|m| (m.id, m.created_at)));

        let floor = self.floor();
        self.delivered.retain(|_, at| *at > floor);

        Ok(Some(StreamEvent::Messages {
            channel_id: self.channel_id,
            messages,
        }))
    }
}

/// Lifecycle of one streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Polling,
    Emitting,
    Closed,
}

/// Timer settings for a stream connection
#[derive(Debug, Clone, Copy)]
pub struct StreamTimers {
    pub ping_interval: Duration,
    pub poll_interval: Duration,
}

/// Drives one connection: pings on one timer, polls its watcher on another
///
/// Stops when the cancellation token fires or the receiving side goes away.
pub struct StreamDriver {
    watcher: Box<dyn Watcher>,
    clock: Arc<dyn Clock>,
    timers: StreamTimers,
    sender: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    state: StreamState,
}

impl StreamDriver {
    pub fn new(
        watcher: Box<dyn Watcher>,
        clock: Arc<dyn Clock>,
        timers: StreamTimers,
        sender: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            watcher,
            clock,
            timers,
            sender,
            cancel,
            state: StreamState::Open,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    fn transition(&mut self, next: StreamState) {
        if self.state != next {
            tracing::trace!("{} stream: {:?} -> {:?}", self.watcher.name(), self.state, next);
            self.state = next;
        }
    }

    /// Run until cancelled or disconnected; returns the final state
    pub async fn run(mut self) -> StreamState {
        let start = Instant::now();
        let mut ping = interval_at(start + self.timers.ping_interval, self.timers.ping_interval);
        let mut poll = interval_at(start + self.timers.poll_interval, self.timers.poll_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!("{} stream opened", self.watcher.name());
        self.transition(StreamState::Polling);

        loop {
            let keep_going = tokio::select! {
                _ = self.cancel.cancelled() => false,
                _ = ping.tick() => {
                    let event = StreamEvent::Ping { timestamp: self.clock.now() };
                    self.emit(event).await
                }
                _ = poll.tick() => self.poll_once().await,
            };

            if !keep_going {
                break;
            }
        }

        self.transition(StreamState::Closed);
        tracing::debug!("{} stream closed", self.watcher.name());
        self.state
    }

    /// Poll the watcher once; a slow poll still yields to cancellation
    async fn poll_once(&mut self) -> bool {
        let polled = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            polled = self.watcher.poll() => polled,
        };

        match polled {
            Ok(Some(event)) => self.emit(event).await,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!("{} poll failed, skipping tick: {}", self.watcher.name(), e);
                true
            }
        }
    }

    async fn emit(&mut self, event: StreamEvent) -> bool {
        self.transition(StreamState::Emitting);
        let delivered = tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.sender.send(event) => sent.is_ok(),
        };
        if delivered {
            self.transition(StreamState::Polling);
        }
        delivered
    }
}
