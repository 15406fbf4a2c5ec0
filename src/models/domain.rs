use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wildcard entry in a gender-interest set
pub const GENDER_WILDCARD: &str = "all";

/// Geographic coordinates in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// User profile as read from the profile store
///
/// Profiles are owned by the profile-edit flow; this service only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub age: u8,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(rename = "genderInterests", default)]
    pub gender_interests: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub location: Option<Coordinates>,
    #[serde(rename = "completionPercentage")]
    pub completion: u8,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Declared gender, ignoring blank values
    pub fn declared_gender(&self) -> Option<&str> {
        self.gender
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }

    /// Whether this profile is open to being shown to someone of `gender`
    pub fn is_interested_in(&self, gender: &str) -> bool {
        self.gender_interests
            .iter()
            .any(|g| g.eq_ignore_ascii_case(gender) || g.eq_ignore_ascii_case(GENDER_WILDCARD))
    }

    /// The genders this profile wants to see, or `None` when unrestricted
    pub fn gender_preference(&self) -> Option<Vec<String>> {
        if self.gender_interests.is_empty()
            || self
                .gender_interests
                .iter()
                .any(|g| g.eq_ignore_ascii_case(GENDER_WILDCARD))
        {
            return None;
        }
        Some(self.gender_interests.iter().map(|g| g.to_lowercase()).collect())
    }
}

/// Kind of a directional signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Like,
    Pass,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Like => "like",
            SignalKind::Pass => "pass",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed like/pass edge. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "fromUser")]
    pub from_user: String,
    #[serde(rename = "toUser")]
    pub to_user: String,
    pub kind: SignalKind,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Conversation channel between two mutually-liking users
///
/// Members are stored in canonical order (`user_a < user_b`) so the unordered pair
/// has exactly one representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    #[serde(rename = "userA")]
    pub user_a: String,
    #[serde(rename = "userB")]
    pub user_b: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastMessageId")]
    pub last_message_id: Option<Uuid>,
    #[serde(rename = "lastMessageAt")]
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Channel {
    pub fn new(first: &str, second: &str, created_at: DateTime<Utc>) -> Self {
        let (user_a, user_b) = canonical_pair(first, second);
        Self {
            id: Uuid::new_v4(),
            user_a,
            user_b,
            created_at,
            last_message_id: None,
            last_message_at: None,
        }
    }

    pub fn has_member(&self, user_id: &str) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The member that is not `user_id`, if `user_id` is a member at all
    pub fn counterpart(&self, user_id: &str) -> Option<&str> {
        if self.user_a == user_id {
            Some(&self.user_b)
        } else if self.user_b == user_id {
            Some(&self.user_a)
        } else {
            None
        }
    }

    /// Most recent activity: last message time, falling back to creation time
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message_at
            .map_or(self.created_at, |at| at.max(self.created_at))
    }
}

/// Order a user pair canonically
pub fn canonical_pair(first: &str, second: &str) -> (String, String) {
    if first <= second {
        (first.to_string(), second.to_string())
    } else {
        (second.to_string(), first.to_string())
    }
}

/// A message posted to a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    #[serde(rename = "channelId")]
    pub channel_id: Uuid,
    #[serde(rename = "senderId")]
    pub sender_id: String,
    pub body: String,
    pub read: bool,
    #[serde(rename = "readAt")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(channel_id: Uuid, sender_id: &str, body: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id,
            sender_id: sender_id.to_string(),
            body,
            read: false,
            read_at: None,
            created_at,
        }
    }
}

/// Photo document held by the external media store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    #[serde(rename = "fileId")]
    pub file_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub position: u32,
}

/// Score breakdown for a single candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total: u32,
    #[serde(rename = "tagMatchScore")]
    pub tag_match_score: u32,
    #[serde(rename = "distancePoints")]
    pub distance_points: u32,
    #[serde(rename = "commonTags")]
    pub common_tags: Vec<String>,
    #[serde(rename = "distanceKm")]
    pub distance_km: Option<f64>,
}

/// Output of the selection stage
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub profile: Profile,
    pub score: ScoreBreakdown,
}

/// Fully enriched candidate returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub age: u8,
    pub gender: Option<String>,
    pub tags: Vec<String>,
    pub score: ScoreBreakdown,
    #[serde(rename = "distanceLabel")]
    pub distance_label: Option<String>,
    #[serde(rename = "interestOverlap")]
    pub interest_overlap: u8,
    pub photos: Vec<PhotoRecord>,
}

/// Query for the bounded candidate window
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    /// Viewer's declared gender; `None` means the reciprocal pool is unrestricted
    pub viewer_gender: Option<String>,
    /// Genders the viewer wants to see; `None` means any
    pub preferred_genders: Option<Vec<String>>,
    pub exclude_user_ids: Vec<String>,
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_pair_orders_members() {
        assert_eq!(canonical_pair("b", "a"), ("a".to_string(), "b".to_string()));
        assert_eq!(canonical_pair("a", "b"), ("a".to_string(), "b".to_string()));
    }

    #[test]
    fn test_canonical_pair_uses_byte_order() {
        // Uppercase sorts before lowercase and '-' before letters, unlike locale collations
        assert_eq!(canonical_pair("alice", "Zed"), ("Zed".to_string(), "alice".to_string()));
        assert_eq!(canonical_pair("ab", "a-c"), ("a-c".to_string(), "ab".to_string()));
    }

    #[test]
    fn test_channel_counterpart() {
        let channel = Channel::new("zoe", "adam", Utc::now());
        assert_eq!(channel.user_a, "adam");
        assert_eq!(channel.counterpart("zoe"), Some("adam"));
        assert_eq!(channel.counterpart("adam"), Some("zoe"));
        assert_eq!(channel.counterpart("eve"), None);
    }

    #[test]
    fn test_gender_preference_wildcard() {
        let mut profile = Profile {
            user_id: "u".to_string(),
            display_name: "U".to_string(),
            age: 30,
            gender: Some("female".to_string()),
            gender_interests: vec!["male".to_string(), "ALL".to_string()],
            tags: vec![],
            location: None,
            completion: 100,
            created_at: Utc::now(),
        };
        assert!(profile.gender_preference().is_none());
        assert!(profile.is_interested_in("nonbinary"));

        profile.gender_interests = vec!["Male".to_string()];
        assert_eq!(profile.gender_preference(), Some(vec!["male".to_string()]));
        assert!(profile.is_interested_in("male"));
        assert!(!profile.is_interested_in("female"));
    }
}
