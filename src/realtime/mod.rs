// Realtime exports: typing presence and polling-backed event streams
pub mod presence;
pub mod sse;
pub mod stream;

use std::time::Duration;

pub use presence::PresenceBoard;
pub use sse::{encode_event, retry_frame, sse_response, SseBody, FALLBACK_HEADER};
pub use stream::{
    ConversationWatcher, MatchListWatcher, StreamDriver, StreamEvent, StreamState, StreamTimers, Watcher,
    DEFAULT_LATE_COMMIT_WINDOW,
};

/// Intervals used by the stream endpoints
#[derive(Debug, Clone, Copy)]
pub struct RealtimeSettings {
    pub ping_interval: Duration,
    pub match_poll_interval: Duration,
    pub message_poll_interval: Duration,
    /// Re-fetch interval advertised to clients that cannot hold a stream
    pub fallback_interval: Duration,
    /// How far back watchers re-read for rows that committed late
    pub late_commit_window: Duration,
}

impl RealtimeSettings {
    pub fn match_list_timers(&self) -> StreamTimers {
        StreamTimers {
            ping_interval: self.ping_interval,
            poll_interval: self.match_poll_interval,
        }
    }

    pub fn conversation_timers(&self) -> StreamTimers {
        StreamTimers {
            ping_interval: self.ping_interval,
            poll_interval: self.message_poll_interval,
        }
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(15),
            match_poll_interval: Duration::from_secs(3),
            message_poll_interval: Duration::from_secs(2),
            fallback_interval: Duration::from_secs(7),
            late_commit_window: stream::DEFAULT_LATE_COMMIT_WINDOW,
        }
    }
}
