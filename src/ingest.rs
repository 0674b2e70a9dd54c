use chrono::{DateTime, Utc};
use tracing::debug;

use crate::index::{ExpirationIndex, MessageId};
use crate::policy::RetentionPolicy;

/// Entry point for newly created messages in the monitored chat.
///
/// Callers are expected to filter out messages from other chats first.
#[derive(Debug, Clone)]
pub struct Ingestor {
    index: ExpirationIndex,
    policy: RetentionPolicy,
}

impl Ingestor {
    pub fn new(index: ExpirationIndex, policy: RetentionPolicy) -> Self {
        Self { index, policy }
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Tracks a message and returns the instant it becomes eligible for deletion.
    pub async fn ingest(&self, message_id: MessageId, created_at: DateTime<Utc>) -> DateTime<Utc> {
        let delete_at = self.policy.compute_delete_at(created_at);
        self.index.put(message_id, delete_at).await;

        debug!(
            message_id = %message_id,
            created_at = %created_at,
            delete_at = %delete_at,
            "Tracking message for deletion"
        );

        delete_at
    }
}
