use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};

use crate::index::MessageId;
use crate::store::error::{self, StoreError};
use crate::store::{DeleteOutcome, MessageStore};

pub const TELEGRAM_STORE_NAME: &str = "telegram";

/// Message store backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramStore {
    bot: Bot,
}

impl TelegramStore {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MessageStore for TelegramStore {
    async fn fetch_message(
        &self,
        _channel_id: i64,
        _message_id: MessageId,
    ) -> error::Result<()> {
        // The Bot API has no message lookup; delete reports "not found" itself.
        Ok(())
    }

    async fn delete_message(&self, channel_id: i64, message_id: MessageId) -> DeleteOutcome {
        let result = self
            .bot
            .delete_message(ChatId(channel_id), message_id.into())
            .await
            .map(|_| ())
            .map_err(classify_request_error);

        DeleteOutcome::from(result)
    }

    fn store_name(&self) -> &'static str {
        TELEGRAM_STORE_NAME
    }
}

/// Maps a teloxide request error onto the store error taxonomy.
pub fn classify_request_error(err: RequestError) -> StoreError {
    match err {
        RequestError::Api(ApiError::MessageToDeleteNotFound) => {
            StoreError::not_found("message to delete not found")
        }
        RequestError::Api(api @ (ApiError::MessageCantBeDeleted | ApiError::BotKicked)) => {
            StoreError::permission(api.to_string())
        }
        RequestError::RetryAfter(secs) => StoreError::rate_limited(Some(u64::from(secs.seconds()))),
        RequestError::Network(e) => StoreError::network(e.to_string()),
        RequestError::Io(e) => StoreError::network(e.to_string()),
        other => StoreError::api(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use teloxide::types::Seconds;

    #[test]
    fn test_classify_not_found() {
        let err = classify_request_error(RequestError::Api(ApiError::MessageToDeleteNotFound));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_classify_permission() {
        let err = classify_request_error(RequestError::Api(ApiError::MessageCantBeDeleted));
        assert!(matches!(err, StoreError::Permission { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classify_retry_after() {
        let err = classify_request_error(RequestError::RetryAfter(Seconds::from_seconds(30)));
        assert!(matches!(
            err,
            StoreError::RateLimited {
                retry_after: Some(30)
            }
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_io_as_network() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let err = classify_request_error(RequestError::Io(Arc::new(io)));
        assert!(matches!(err, StoreError::Network { .. }));
        assert!(err.is_transient());
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_classify_other_api_error() {
        let err = classify_request_error(RequestError::Api(ApiError::ChatNotFound));
        assert!(matches!(err, StoreError::Api { .. }));
    }

    #[test]
    fn test_store_name() {
        let store = TelegramStore::new(Bot::new("123456789:ABCdefGHIjklMNOpqrsTUVwxyz"));
        assert_eq!(store.store_name(), "telegram");
    }
}
