use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::{Candidate, Message};

/// Response for the discovery endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiscoveryResponse {
    Candidate { candidate: Candidate },
    NoProfiles,
}

/// Outcome of a like signal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LikeOutcome {
    pub created: bool,
    #[serde(rename = "alreadyExists")]
    pub already_exists: bool,
    pub matched: bool,
    #[serde(rename = "channelId", skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Uuid>,
}

/// Outcome of a pass signal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassOutcome {
    pub created: bool,
    #[serde(rename = "alreadyExists")]
    pub already_exists: bool,
}

/// Preview of the most recent message in a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePreview {
    pub id: Uuid,
    #[serde(rename = "senderId")]
    pub sender_id: String,
    pub body: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessagePreview {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id.clone(),
            body: message.body.clone(),
            created_at: message.created_at,
        }
    }
}

/// One entry of the viewer's channel list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    #[serde(rename = "channelId")]
    pub channel_id: Uuid,
    #[serde(rename = "otherUserId")]
    pub other_user_id: String,
    #[serde(rename = "otherDisplayName")]
    pub other_display_name: Option<String>,
    #[serde(rename = "lastMessage")]
    pub last_message: Option<MessagePreview>,
    #[serde(rename = "lastActivityAt")]
    pub last_activity_at: DateTime<Utc>,
    #[serde(rename = "unreadCount")]
    pub unread_count: u64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Response for the channel list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelListResponse {
    pub channels: Vec<ChannelSummary>,
    pub total: usize,
}

/// Response for the message list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageListResponse {
    #[serde(rename = "channelId")]
    pub channel_id: Uuid,
    pub messages: Vec<Message>,
}

/// Response for typing queries and updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingResponse {
    #[serde(rename = "channelId")]
    pub channel_id: Uuid,
    pub typing: Vec<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    pub retry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
