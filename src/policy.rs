//! Retention policy
//!
//! Turns a message's creation time into the instant it may be deleted.
//! Evaluated once per message, at ingestion.

use chrono::{DateTime, Duration, Utc};

/// Retention applied in fast mode, regardless of the configured duration.
pub const FAST_MODE_RETENTION_SECS: i64 = 60;

/// Longest accepted retention (ten years).
pub const MAX_RETENTION_HOURS: u64 = 24 * 365 * 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    retention: Duration,
    fast_mode: bool,
}

impl RetentionPolicy {
    pub fn new(retention: Duration, fast_mode: bool) -> Self {
        Self {
            retention,
            fast_mode,
        }
    }

    /// Builds a policy from a whole number of hours. Zero and anything above
    /// [`MAX_RETENTION_HOURS`] are rejected.
    pub fn from_hours(hours: u64, fast_mode: bool) -> Option<Self> {
        if hours == 0 || hours > MAX_RETENTION_HOURS {
            return None;
        }
        let hours = i64::try_from(hours).ok()?;
        Duration::try_hours(hours).map(|retention| Self::new(retention, fast_mode))
    }

    pub fn fast_mode(&self) -> bool {
        self.fast_mode
    }

    /// The retention actually applied to new messages.
    pub fn effective_retention(&self) -> Duration {
        if self.fast_mode {
            Duration::seconds(FAST_MODE_RETENTION_SECS)
        } else {
            self.retention
        }
    }

    /// Saturates at the latest representable instant instead of overflowing.
    pub fn compute_delete_at(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at
            .checked_add_signed(self.effective_retention())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Compact form used in the bot's status line, e.g. `24h` or `60s`.
    pub fn short_label(&self) -> String {
        if self.fast_mode {
            format!("{}s", FAST_MODE_RETENTION_SECS)
        } else {
            format!("{}h", self.retention.num_hours())
        }
    }

    /// Long form used in the startup announcement, e.g. `24 hours`.
    pub fn human_label(&self) -> String {
        if self.fast_mode {
            return "1 minute".to_string();
        }
        match self.retention.num_hours() {
            1 => "1 hour".to_string(),
            hours => format!("{} hours", hours),
        }
    }
}
