use crate::ingest::Ingestor;
use anyhow::Result;
use async_trait::async_trait;

pub mod telegram;

pub use telegram::{TelegramChannel, TelegramError};

/// Source of message-created events for the monitored chat.
///
/// Channels are responsible for:
/// - Receiving new messages from the external service
/// - Filtering them to the monitored chat
/// - Handing each one to the [`Ingestor`]
#[async_trait]
pub trait Channel: Send + Sync {
    /// Start listening for new messages.
    ///
    /// Spawns background tasks and returns immediately after setup.
    async fn start(&self, ingestor: Ingestor) -> Result<()>;

    /// Stop listening. Safe to call more than once.
    async fn shutdown(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ExpirationIndex, MessageId};
    use crate::policy::RetentionPolicy;
    use chrono::Utc;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    // Mock channel that ingests a fixed set of ids on start
    struct MockChannel {
        ids: Vec<i32>,
        started: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl Channel for MockChannel {
        async fn start(&self, ingestor: Ingestor) -> Result<()> {
            for id in &self.ids {
                ingestor.ingest(MessageId(*id), Utc::now()).await;
            }
            *self.started.lock().await = true;
            Ok(())
        }

        async fn shutdown(&self) -> Result<()> {
            *self.started.lock().await = false;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_channel_trait() {
        let index = ExpirationIndex::new();
        let ingestor = Ingestor::new(index.clone(), RetentionPolicy::from_hours(1, false).unwrap());
        let channel = MockChannel {
            ids: vec![1, 2, 3],
            started: Arc::new(Mutex::new(false)),
        };

        channel.start(ingestor).await.unwrap();
        assert_eq!(index.len().await, 3);
        assert!(*channel.started.lock().await);

        channel.shutdown().await.unwrap();
        assert!(!*channel.started.lock().await);
    }
}
