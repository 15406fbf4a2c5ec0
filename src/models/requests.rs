use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Maximum message body length, in characters
pub const MAX_MESSAGE_CHARS: u64 = 1000;

/// Request body for like/pass signals
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignalRequest {
    #[validate(length(min = 1, max = 128))]
    #[serde(alias = "to_user", rename = "toUser")]
    pub to_user: String,
}

/// Request body for blocking a user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BlockRequest {
    #[validate(length(min = 1, max = 128))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
}

/// Request body for posting a message
///
/// Length is checked again after trimming by the message store.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PostMessageRequest {
    #[validate(length(min = 1))]
    pub text: String,
}

/// Request body for updating typing state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingRequest {
    #[serde(alias = "channel_id", rename = "channelId")]
    pub channel_id: Uuid,
    #[serde(default = "default_typing")]
    pub typing: bool,
}

fn default_typing() -> bool {
    true
}

/// Query string for reading typing state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingQuery {
    #[serde(alias = "channel_id", rename = "channelId")]
    pub channel_id: Uuid,
}
