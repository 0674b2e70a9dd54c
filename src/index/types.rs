use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a message in the monitored chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for MessageId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl From<teloxide::types::MessageId> for MessageId {
    fn from(id: teloxide::types::MessageId) -> Self {
        Self(id.0)
    }
}

impl From<MessageId> for teloxide::types::MessageId {
    fn from(id: MessageId) -> Self {
        teloxide::types::MessageId(id.0)
    }
}

/// A tracked message and the instant it becomes eligible for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationEntry {
    pub message_id: MessageId,
    pub delete_at: DateTime<Utc>,
}

impl ExpirationEntry {
    pub fn new(message_id: MessageId, delete_at: DateTime<Utc>) -> Self {
        Self {
            message_id,
            delete_at,
        }
    }

    /// True once `now` has reached `delete_at`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        now >= self.delete_at
    }

    /// True when `delete_at` lies strictly before `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.delete_at < cutoff
    }
}
