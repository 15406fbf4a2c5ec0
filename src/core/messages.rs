use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::try_join_all;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{Channel, ChannelSummary, Message, MessagePreview, MAX_MESSAGE_CHARS};
use crate::services::Store;

/// Messages and channel listings for channel members
#[derive(Clone)]
pub struct MessageStore {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl MessageStore {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Load a channel the viewer belongs to
    ///
    /// Unknown channels and channels the viewer is not part of both report `NotFound`.
    pub async fn require_member(&self, channel_id: Uuid, viewer_id: &str) -> Result<Channel, AppError> {
        match self.store.get_channel(channel_id).await? {
            Some(channel) if channel.has_member(viewer_id) => Ok(channel),
            _ => Err(AppError::NotFound(format!("channel {}", channel_id))),
        }
    }

    /// Append a message, then move the channel's last-message pointer
    pub async fn post_message(
        &self,
        channel_id: Uuid,
        sender_id: &str,
        text: &str,
    ) -> Result<Message, AppError> {
        let channel = self.require_member(channel_id, sender_id).await?;

        let body = text.trim();
        if body.is_empty() {
            return Err(AppError::Validation("message text is empty".to_string()));
        }
        if body.chars().count() > MAX_MESSAGE_CHARS as usize {
            return Err(AppError::Validation(format!(
                "message text exceeds {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        if let Some(other) = channel.counterpart(sender_id) {
            if self.store.is_blocked(other, sender_id).await? {
                return Err(AppError::Forbidden(
                    "the other member is not accepting messages".to_string(),
                ));
            }
        }

        let message = Message::new(channel.id, sender_id, body.to_string(), self.clock.now());
        self.store.insert_message(&message).await?;
        self.store
            .set_last_message(channel.id, message.id, message.created_at)
            .await?;

        tracing::debug!("Message {} posted to channel {}", message.id, channel.id);
        Ok(message)
    }

    /// All messages in a channel, oldest first, after marking the viewer's unread ones as read
    pub async fn list_messages(&self, channel_id: Uuid, viewer_id: &str) -> Result<Vec<Message>, AppError> {
        self.require_member(channel_id, viewer_id).await?;

        let flipped = self
            .store
            .mark_read(channel_id, viewer_id, self.clock.now())
            .await?;
        if flipped > 0 {
            tracing::debug!("Marked {} messages read in channel {} for {}", flipped, channel_id, viewer_id);
        }

        Ok(self.store.messages(channel_id).await?)
    }

    pub async fn unread_count(&self, channel_id: Uuid, viewer_id: &str) -> Result<u64, AppError> {
        self.require_member(channel_id, viewer_id).await?;
        Ok(self.store.unread_count(channel_id, viewer_id).await?)
    }

    /// The viewer's channels, most recently active first
    pub async fn list_channels(&self, viewer_id: &str) -> Result<Vec<ChannelSummary>, AppError> {
        let channels = self.store.channels_for(viewer_id).await?;

        let others: Vec<String> = channels
            .iter()
            .filter_map(|c| c.counterpart(viewer_id).map(str::to_string))
            .collect();
        let names = self.display_names_or_empty(&others).await;

        try_join_all(
            channels
                .iter()
                .map(|channel| self.summarize(channel, viewer_id, &names)),
        )
        .await
    }

    async fn summarize(
        &self,
        channel: &Channel,
        viewer_id: &str,
        names: &HashMap<String, String>,
    ) -> Result<ChannelSummary, AppError> {
        let other = channel.counterpart(viewer_id).unwrap_or_default().to_string();

        let last_message = match channel.last_message_id {
            Some(id) => self.store.get_message(id).await?,
            None => None,
        };
        let unread_count = self.store.unread_count(channel.id, viewer_id).await?;

        Ok(ChannelSummary {
            channel_id: channel.id,
            other_display_name: names.get(&other).cloned(),
            other_user_id: other,
            last_message: last_message.as_ref().map(MessagePreview::from),
            last_activity_at: channel.last_activity(),
            unread_count,
            created_at: channel.created_at,
        })
    }

    async fn display_names_or_empty(&self, user_ids: &[String]) -> HashMap<String, String> {
        if user_ids.is_empty() {
            return HashMap::new();
        }
        match self.store.display_names(user_ids).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!("Display name lookup failed, listing channels without names: {}", e);
                HashMap::new()
            }
        }
    }
}
