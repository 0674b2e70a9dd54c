//! Error types for remote message store operations
//!
//! Errors are categorized so the sweep can tell "already gone" apart from
//! everything else. Every non-`NotFound` error leaves the entry tracked for
//! the next sweep tick.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The message no longer exists in the store
    #[error("Message not found: {message}")]
    NotFound { message: String },

    /// Connection issues, DNS failures, dropped requests
    #[error("Network error: {message}")]
    Network { message: String },

    /// The store asked us to slow down
    #[error("Rate limit exceeded (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// The bot lacks the rights to delete in this chat
    #[error("Permission denied: {message}")]
    Permission { message: String },

    /// The call did not complete within the configured timeout
    #[error("Request timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Any other error returned by the store's API
    #[error("API error: {message}")]
    Api { message: String },
}

impl StoreError {
    /// Returns true for errors that are expected to clear up on their own.
    ///
    /// Permission and API errors are reported as permanent, but the sweep
    /// still retries them until the reaper drops the entry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Network { .. } | StoreError::RateLimited { .. } | StoreError::Timeout { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn rate_limited(retry_after: Option<u64>) -> Self {
        Self::RateLimited { retry_after }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
