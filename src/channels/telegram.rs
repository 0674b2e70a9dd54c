use crate::channels::Channel;
use crate::index::MessageId;
use crate::ingest::Ingestor;
use crate::policy::RetentionPolicy;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::dptree;
use teloxide::payloads::SetMyShortDescriptionSetters;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Update};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Invalid token format: {0}. Check @BotFather (https://t.me/BotFather) for a valid token.")]
    InvalidTokenFormat(String),

    #[error("Telegram API error: {0}")]
    ApiError(String),
}

/// Chat whose messages are tracked, injected into the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MonitoredChat(i64);

/// Telegram adapter that feeds new messages of the monitored chat into the
/// expiration index.
///
/// Handles:
/// - Long-polling for regular messages and channel posts
/// - Dropping updates from any other chat
/// - The startup announcement and the bot's status line
pub struct TelegramChannel {
    bot: Bot,
    channel_id: i64,
    shutdown_tx: Arc<RwLock<Option<mpsc::Sender<()>>>>,
}

impl TelegramChannel {
    /// Create a new TelegramChannel for the given bot token and monitored chat.
    ///
    /// Token format should be: "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"
    pub fn new(token: String, channel_id: i64) -> Result<Self> {
        if !is_valid_token_format(&token) {
            return Err(TelegramError::InvalidTokenFormat(
                "Token must be in format: digits:alphanumeric (e.g., 123456789:ABC...)".to_string(),
            )
            .into());
        }

        Ok(Self {
            bot: Bot::new(token),
            channel_id,
            shutdown_tx: Arc::new(RwLock::new(None)),
        })
    }

    /// Bot handle, shared with the message store.
    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    pub fn channel_id(&self) -> i64 {
        self.channel_id
    }

    /// Posts the activation notice to the monitored chat.
    ///
    /// The notice is ingested like any other message so it expires too.
    /// Returns the number of lines sent.
    pub async fn announce(&self, ingestor: &Ingestor) -> Result<usize> {
        let lines = announcement_lines(ingestor.policy());

        for line in &lines {
            let sent = self
                .bot
                .send_message(ChatId(self.channel_id), line)
                .await
                .map_err(|e| {
                    TelegramError::ApiError(format!(
                        "Failed to announce in chat {}: {}",
                        self.channel_id, e
                    ))
                })?;

            ingestor.ingest(MessageId::from(sent.id), sent.date).await;
        }

        tracing::info!(chat_id = self.channel_id, "Announced activation");
        Ok(lines.len())
    }

    /// Shows the retention timer in the bot's profile.
    pub async fn set_status(&self, policy: &RetentionPolicy) -> Result<()> {
        self.bot
            .set_my_short_description()
            .short_description(status_line(policy))
            .await
            .map_err(|e| TelegramError::ApiError(format!("Failed to set status: {}", e)))?;

        tracing::debug!(status = %status_line(policy), "Bot status updated");
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    async fn start(&self, ingestor: Ingestor) -> Result<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        {
            let mut tx = self.shutdown_tx.write().await;
            *tx = Some(shutdown_tx);
        }

        let bot = self.bot.clone();
        let monitored = MonitoredChat(self.channel_id);

        tokio::spawn(async move {
            // Groups deliver messages, channels deliver channel posts
            let handler = dptree::entry()
                .branch(Update::filter_message().endpoint(track_message))
                .branch(Update::filter_channel_post().endpoint(track_message));

            let mut dispatcher = Dispatcher::builder(bot, handler)
                .dependencies(dptree::deps![ingestor, monitored])
                .default_handler(|_upd| async move {
                    tracing::trace!("Ignoring update that carries no new message");
                })
                .build();

            tokio::select! {
                _ = dispatcher.dispatch() => {
                    tracing::info!("Telegram dispatcher stopped");
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Telegram dispatcher received shutdown signal");
                }
            }
        });

        tracing::info!(
            chat_id = self.channel_id,
            "Telegram channel connected and listening for messages"
        );
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(()).await;
            tracing::info!("Telegram channel shutdown signal sent");
        }
        Ok(())
    }
}

async fn track_message(
    msg: Message,
    ingestor: Ingestor,
    monitored: MonitoredChat,
) -> std::result::Result<(), TelegramError> {
    if !is_monitored_chat(msg.chat.id, monitored.0) {
        tracing::trace!(chat_id = msg.chat.id.0, "Message outside monitored chat, ignoring");
        return Ok(());
    }

    ingestor.ingest(MessageId::from(msg.id), msg.date).await;
    Ok(())
}

fn is_monitored_chat(chat_id: ChatId, monitored: i64) -> bool {
    chat_id.0 == monitored
}

/// Text posted to the monitored chat on startup.
pub fn announcement_lines(policy: &RetentionPolicy) -> Vec<String> {
    vec![
        "Bot is now online!".to_string(),
        "Cleanup crew activated.".to_string(),
        format!("Messages will auto-delete after {}.", policy.human_label()),
    ]
}

pub fn status_line(policy: &RetentionPolicy) -> String {
    format!("Clean-up timer: {}", policy.short_label())
}

/// Validates Telegram bot token format.
///
/// Expected format: "123456789:ABCdefGHIjklMNOpqrsTUVwxyz"
/// - Bot ID must be all digits
/// - Must contain exactly one colon separator
/// - Secret part must be non-empty
pub fn is_valid_token_format(token: &str) -> bool {
    let Some((bot_id, secret)) = token.split_once(':') else {
        return false;
    };

    if bot_id.is_empty() || !bot_id.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    !secret.is_empty() && !secret.contains(':')
}
