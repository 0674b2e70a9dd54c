use crate::channels::telegram::is_valid_token_format;
use crate::config::loader::ConfigError;
use crate::policy::{MAX_RETENTION_HOURS, RetentionPolicy};
use crate::sweep::SweepConfig;
use crate::sweep::types::{
    DEFAULT_DELETE_TIMEOUT_SECS, DEFAULT_REAP_INTERVAL_SECS, DEFAULT_STALENESS_DAYS,
    DEFAULT_SWEEP_INTERVAL_SECS, MAX_STALENESS_DAYS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_RETENTION_HOURS: u64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_token: Option<String>,

    /// Chat whose messages are purged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<i64>,

    /// Hours a message may live before it is deleted
    pub retention_hours: u64,

    /// Development mode: every message expires after 60 seconds
    pub fast_mode: bool,

    pub sweep_interval_secs: u64,

    pub reap_interval_secs: u64,

    /// Days past `delete_at` before a stuck entry is dropped from memory
    pub staleness_days: u64,

    pub delete_timeout_secs: u64,

    pub max_concurrent_deletes: usize,

    pub verify_before_delete: bool,

    /// Post an activation notice and status line on startup
    pub announce: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_token: None,
            channel_id: None,
            retention_hours: DEFAULT_RETENTION_HOURS,
            fast_mode: false,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            reap_interval_secs: DEFAULT_REAP_INTERVAL_SECS,
            staleness_days: DEFAULT_STALENESS_DAYS,
            delete_timeout_secs: DEFAULT_DELETE_TIMEOUT_SECS,
            max_concurrent_deletes: 1,
            verify_before_delete: true,
            announce: true,
        }
    }
}

/// Token-free view of the configuration, safe to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeConfigSummary {
    pub telegram_configured: bool,
    pub channel_id: Option<i64>,
    pub retention_hours: u64,
    pub fast_mode: bool,
    pub sweep_interval_secs: u64,
    pub reap_interval_secs: u64,
    pub staleness_days: u64,
}

impl Config {
    /// Checks everything the daemon needs before it starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.telegram_token {
            None => return Err(ConfigError::missing("telegram_token")),
            Some(token) if !is_valid_token_format(token) => {
                return Err(ConfigError::invalid(
                    "telegram_token",
                    "expected <bot id>:<secret>",
                ));
            }
            Some(_) => {}
        }

        if self.channel_id.is_none() {
            return Err(ConfigError::missing("channel_id"));
        }

        self.retention_policy()?;

        let positive = [
            ("sweep_interval_secs", self.sweep_interval_secs),
            ("reap_interval_secs", self.reap_interval_secs),
            ("staleness_days", self.staleness_days),
            ("delete_timeout_secs", self.delete_timeout_secs),
            ("max_concurrent_deletes", self.max_concurrent_deletes as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }

        self.sweep_config()?;

        Ok(())
    }

    pub fn retention_policy(&self) -> Result<RetentionPolicy, ConfigError> {
        RetentionPolicy::from_hours(self.retention_hours, self.fast_mode).ok_or_else(|| {
            ConfigError::invalid(
                "retention_hours",
                format!("must be between 1 and {} hours", MAX_RETENTION_HOURS),
            )
        })
    }

    pub fn sweep_config(&self) -> Result<SweepConfig, ConfigError> {
        let channel_id = self
            .channel_id
            .ok_or_else(|| ConfigError::missing("channel_id"))?;
        let staleness_days = Some(self.staleness_days)
            .filter(|&days| days <= MAX_STALENESS_DAYS)
            .and_then(|days| i64::try_from(days).ok())
            .and_then(chrono::Duration::try_days)
            .ok_or_else(|| {
                ConfigError::invalid(
                    "staleness_days",
                    format!("must be at most {} days", MAX_STALENESS_DAYS),
                )
            })?;

        Ok(SweepConfig {
            channel_id,
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            reap_interval: Duration::from_secs(self.reap_interval_secs),
            staleness_bound: staleness_days,
            delete_timeout: Duration::from_secs(self.delete_timeout_secs),
            max_concurrent_deletes: self.max_concurrent_deletes,
            verify_before_delete: self.verify_before_delete,
        })
    }

    pub fn get_safe_summary(&self) -> SafeConfigSummary {
        SafeConfigSummary {
            telegram_configured: self.telegram_token.is_some(),
            channel_id: self.channel_id,
            retention_hours: self.retention_hours,
            fast_mode: self.fast_mode,
            sweep_interval_secs: self.sweep_interval_secs,
            reap_interval_secs: self.reap_interval_secs,
            staleness_days: self.staleness_days,
        }
    }
}
