//! Two-party conversations and their messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChatId, MessageId, UserId};

/// A conversation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    /// Sorted participant ids joined with `:`, unique per pair
    #[serde(default)]
    pub pair_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Unordered pair of chat participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantPair {
    low: UserId,
    high: UserId,
}

impl ParticipantPair {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Key shared by `(a, b)` and `(b, a)`
    pub fn key(&self) -> String {
        format!("{}:{}", self.low, self.high)
    }

    pub const fn members(&self) -> [UserId; 2] {
        [self.low, self.high]
    }
}

/// A message row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    /// Sender
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new message row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub content: String,
}

/// Last message shown under a conversation in the list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePreview {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The other side of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPartner {
    pub id: UserId,
    pub username: String,
    pub full_name: Option<String>,
}

/// Conversation list entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPreview {
    pub chat_id: ChatId,
    pub partner: ChatPartner,
    pub last_message: Option<MessagePreview>,
}

/// Message with its sender's username resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    #[serde(flatten)]
    pub message: Message,
    pub sender: String,
}
