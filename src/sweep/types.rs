use std::time::Duration;

/// Sweep interval when none is configured (one minute)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Reaper interval when none is configured (24 hours)
pub const DEFAULT_REAP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Age past `delete_at` after which the reaper drops an entry (7 days)
pub const DEFAULT_STALENESS_DAYS: u64 = 7;

/// Longest accepted staleness bound (ten years)
pub const MAX_STALENESS_DAYS: u64 = 365 * 10;

/// Upper bound on a single remote call
pub const DEFAULT_DELETE_TIMEOUT_SECS: u64 = 10;

/// Tuning for the sweep and reaper tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    /// Chat whose messages are deleted
    pub channel_id: i64,
    /// Time between sweep ticks
    pub sweep_interval: Duration,
    /// Time between reaper passes
    pub reap_interval: Duration,
    /// Entries whose `delete_at` is older than this are force-dropped
    pub staleness_bound: chrono::Duration,
    /// Timeout applied to each fetch and delete call
    pub delete_timeout: Duration,
    /// Deletes in flight at once during a tick; 1 means sequential
    pub max_concurrent_deletes: usize,
    /// Look the message up before deleting it
    pub verify_before_delete: bool,
}

impl SweepConfig {
    pub fn new(channel_id: i64) -> Self {
        Self {
            channel_id,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            reap_interval: Duration::from_secs(DEFAULT_REAP_INTERVAL_SECS),
            staleness_bound: chrono::Duration::days(DEFAULT_STALENESS_DAYS as i64),
            delete_timeout: Duration::from_secs(DEFAULT_DELETE_TIMEOUT_SECS),
            max_concurrent_deletes: 1,
            verify_before_delete: true,
        }
    }
}

/// What a single sweep tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries in the snapshot
    pub scanned: usize,
    /// Entries whose `delete_at` had passed
    pub eligible: usize,
    /// Entries deleted from the store and untracked
    pub deleted: usize,
    /// Entries untracked because the store no longer had them
    pub already_gone: usize,
    /// Entries left in place for the next tick
    pub failed: usize,
}

impl SweepReport {
    /// Entries removed from the index during the tick.
    pub fn removed(&self) -> usize {
        self.deleted + self.already_gone
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// What a single reaper pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Entries tracked before the pass
    pub scanned: usize,
    /// Entries force-dropped
    pub reaped: usize,
}

/// How the sweep settled one eligible entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Deleted,
    AlreadyGone,
    Retained,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_config_defaults() {
        let config = SweepConfig::new(-100);
        assert_eq!(config.channel_id, -100);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.reap_interval, Duration::from_secs(86_400));
        assert_eq!(config.staleness_bound, chrono::Duration::days(7));
        assert_eq!(config.max_concurrent_deletes, 1);
        assert!(config.verify_before_delete);
    }

    #[test]
    fn test_sweep_report_totals() {
        let report = SweepReport {
            scanned: 10,
            eligible: 6,
            deleted: 3,
            already_gone: 2,
            failed: 1,
        };
        assert_eq!(report.removed(), 5);
        assert!(report.has_failures());
        assert!(!SweepReport::default().has_failures());
    }
}
