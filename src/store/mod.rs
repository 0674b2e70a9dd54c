//! Remote message store abstraction
//!
//! The sweep only ever talks to the store through [`MessageStore`], so tests
//! can swap the Telegram backend for [`mock::MockMessageStore`].

use async_trait::async_trait;

use crate::index::MessageId;

pub mod error;
pub mod mock;
pub mod telegram;

pub use error::StoreError;
pub use telegram::TelegramStore;

/// Result of a single delete request.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// The store confirmed the deletion
    Deleted,
    /// The message was already gone
    NotFound,
    /// Anything else; the entry is retried on the next tick
    Failed(StoreError),
}

impl From<Result<(), StoreError>> for DeleteOutcome {
    fn from(result: Result<(), StoreError>) -> Self {
        match result {
            Ok(()) => DeleteOutcome::Deleted,
            Err(e) if e.is_not_found() => DeleteOutcome::NotFound,
            Err(e) => DeleteOutcome::Failed(e),
        }
    }
}

/// Capability to look up and delete messages in a chat.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Checks that a message still exists.
    ///
    /// Returns `StoreError::NotFound` when it does not. Stores without a
    /// lookup API report every message as present.
    async fn fetch_message(&self, channel_id: i64, message_id: MessageId)
    -> error::Result<()>;

    /// Deletes a message by id.
    async fn delete_message(&self, channel_id: i64, message_id: MessageId) -> DeleteOutcome;

    /// Returns the store name for logging
    fn store_name(&self) -> &'static str;
}
