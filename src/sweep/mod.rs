//! Sweep scheduler and stale-entry reaper
//!
//! Two recurring tasks share the expiration index:
//! - the sweep, every `sweep_interval`, deletes messages whose `delete_at` has
//!   passed and untracks them once the store confirms they are gone
//! - the reaper, every `reap_interval`, force-drops entries that have stayed
//!   past `delete_at` for longer than `staleness_bound`
//!
//! Both passes can also be invoked directly with an explicit `now`, which is
//! what the tests do.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::index::{ExpirationEntry, ExpirationIndex, MessageId};
use crate::store::{DeleteOutcome, MessageStore, StoreError};

pub mod types;

use types::Disposition;
pub use types::{ReapReport, SweepConfig, SweepReport};

pub struct SweepScheduler {
    index: ExpirationIndex,
    store: Arc<dyn MessageStore>,
    config: SweepConfig,
}

impl SweepScheduler {
    pub fn new(index: ExpirationIndex, store: Arc<dyn MessageStore>, config: SweepConfig) -> Self {
        Self {
            index,
            store,
            config,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn index(&self) -> &ExpirationIndex {
        &self.index
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Runs one sweep tick as of `now`.
    ///
    /// Each eligible entry is settled independently; a failing entry stays
    /// tracked and never prevents the others from being processed.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let snapshot = self.index.snapshot().await;
        let eligible: Vec<ExpirationEntry> = snapshot.eligible_at(now).copied().collect();

        let mut report = SweepReport {
            scanned: snapshot.len(),
            eligible: eligible.len(),
            ..Default::default()
        };

        if eligible.is_empty() {
            debug!(scanned = report.scanned, "Sweep found nothing to delete");
            return report;
        }

        let dispositions: Vec<Disposition> =
            stream::iter(eligible.into_iter().map(|entry| self.process(entry)))
                .buffer_unordered(self.config.max_concurrent_deletes.max(1))
                .collect()
                .await;

        for disposition in dispositions {
            match disposition {
                Disposition::Deleted => report.deleted += 1,
                Disposition::AlreadyGone => report.already_gone += 1,
                Disposition::Retained => report.failed += 1,
            }
        }

        if report.has_failures() {
            warn!(
                scanned = report.scanned,
                eligible = report.eligible,
                removed = report.removed(),
                failed = report.failed,
                "Sweep complete, some deletes failed"
            );
        } else {
            info!(
                scanned = report.scanned,
                eligible = report.eligible,
                deleted = report.deleted,
                already_gone = report.already_gone,
                "Sweep complete"
            );
        }

        report
    }

    async fn process(&self, entry: ExpirationEntry) -> Disposition {
        let outcome = self.evict(entry.message_id).await;
        self.settle(entry, outcome).await
    }

    /// Asks the store to get rid of one message, bounded by `delete_timeout`.
    async fn evict(&self, message_id: MessageId) -> DeleteOutcome {
        let channel_id = self.config.channel_id;

        if self.config.verify_before_delete {
            match self
                .with_timeout(self.store.fetch_message(channel_id, message_id))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_not_found() => return DeleteOutcome::NotFound,
                Ok(Err(e)) => return DeleteOutcome::Failed(e),
                Err(e) => return DeleteOutcome::Failed(e),
            }
        }

        self.with_timeout(self.store.delete_message(channel_id, message_id))
            .await
            .unwrap_or_else(DeleteOutcome::Failed)
    }

    async fn with_timeout<T>(&self, call: impl Future<Output = T>) -> Result<T, StoreError> {
        let limit = self.config.delete_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| StoreError::timeout(limit.as_secs()))
    }

    /// Applies a delete outcome to the index.
    async fn settle(&self, entry: ExpirationEntry, outcome: DeleteOutcome) -> Disposition {
        let message_id = entry.message_id;

        match outcome {
            DeleteOutcome::Deleted => {
                self.index.remove(message_id).await;
                info!(
                    message_id = %message_id,
                    delete_at = %entry.delete_at,
                    "Deleted expired message"
                );
                Disposition::Deleted
            }
            DeleteOutcome::NotFound => {
                self.index.remove(message_id).await;
                debug!(
                    message_id = %message_id,
                    "Message already gone from {}, untracking",
                    self.store.store_name()
                );
                Disposition::AlreadyGone
            }
            DeleteOutcome::Failed(e) => {
                warn!(
                    message_id = %message_id,
                    delete_at = %entry.delete_at,
                    transient = e.is_transient(),
                    error = %e,
                    "Failed to delete message, will retry next sweep"
                );
                Disposition::Retained
            }
        }
    }

    pub async fn reap(&self) -> ReapReport {
        self.reap_at(Utc::now()).await
    }

    /// Drops every entry whose `delete_at` is older than `now - staleness_bound`.
    ///
    /// The store is not contacted; these entries are given up on.
    pub async fn reap_at(&self, now: DateTime<Utc>) -> ReapReport {
        // A bound reaching before the earliest instant leaves nothing stale
        let cutoff = now
            .checked_sub_signed(self.config.staleness_bound)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let (scanned, reaped) = self.index.retain_newer_than(cutoff).await;

        info!(
            scanned = scanned,
            reaped = reaped,
            cutoff = %cutoff,
            "Cleaned up stale entries from the expiration index"
        );

        ReapReport { scanned, reaped }
    }

    /// Spawns the sweep and reaper tasks.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let sweeper = Arc::clone(&self);
        let sweep = PeriodicTask::spawn("sweep", self.config.sweep_interval, move || {
            let sweeper = Arc::clone(&sweeper);
            async move {
                sweeper.sweep().await;
            }
        });

        let reaper = Arc::clone(&self);
        let reap = PeriodicTask::spawn("reaper", self.config.reap_interval, move || {
            let reaper = Arc::clone(&reaper);
            async move {
                reaper.reap().await;
            }
        });

        info!(
            channel_id = self.config.channel_id,
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            reap_interval_secs = self.config.reap_interval.as_secs(),
            staleness_days = self.config.staleness_bound.num_days(),
            "Sweep scheduler started"
        );

        SchedulerHandle { sweep, reap }
    }
}

/// Handles to the running sweep and reaper tasks.
pub struct SchedulerHandle {
    sweep: PeriodicTask,
    reap: PeriodicTask,
}

impl SchedulerHandle {
    /// Signals both tasks and waits up to `timeout` for each to finish.
    pub async fn shutdown(self, timeout: Duration) {
        self.sweep.shutdown(timeout).await;
        self.reap.shutdown(timeout).await;
    }
}

/// A task that runs a job on a fixed interval until told to stop.
struct PeriodicTask {
    name: &'static str,
    handle: JoinHandle<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl PeriodicTask {
    fn spawn<F, Fut>(name: &'static str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        job().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!(task = name, "Received shutdown signal, stopping");
                        break;
                    }
                }
            }
        });

        Self {
            name,
            handle,
            shutdown_tx,
        }
    }

    async fn shutdown(self, timeout: Duration) {
        let _ = self.shutdown_tx.send(()).await;

        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => {
                info!(task = self.name, "Task completed gracefully");
            }
            Ok(Err(e)) => {
                error!(task = self.name, "Task panicked: {}", e);
            }
            Err(_) => {
                error!(
                    task = self.name,
                    "Task did not complete within {}s timeout",
                    timeout.as_secs()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mock::MockMessageStore;
    use chrono::Duration as ChronoDuration;

    fn scheduler(store: &MockMessageStore) -> SweepScheduler {
        SweepScheduler::new(
            ExpirationIndex::new(),
            Arc::new(store.clone()),
            SweepConfig::new(-1001),
        )
    }

    #[tokio::test]
    async fn test_sweep_empty_index() {
        let store = MockMessageStore::new();
        let scheduler = scheduler(&store);

        let report = scheduler.sweep().await;

        assert_eq!(report, SweepReport::default());
        assert_eq!(store.total_delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_eligible_entries() {
        let store = MockMessageStore::new();
        let scheduler = scheduler(&store);
        let now = Utc::now();
        let future = now + ChronoDuration::minutes(5);

        scheduler.index().put(MessageId(1), now).await;
        scheduler.index().put(MessageId(2), future).await;

        let report = scheduler.sweep_at(now).await;

        assert_eq!(report.scanned, 2);
        assert_eq!(report.eligible, 1);
        assert_eq!(report.deleted, 1);
        assert!(scheduler.index().get(MessageId(1)).await.is_none());
        assert_eq!(scheduler.index().get(MessageId(2)).await, Some(future));
        assert_eq!(store.delete_calls(MessageId(2)), 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_delete_when_fetch_reports_gone() {
        let store = MockMessageStore::new();
        store.mark_gone(MessageId(4));
        let scheduler = scheduler(&store);
        let now = Utc::now();
        scheduler.index().put(MessageId(4), now).await;

        let report = scheduler.sweep_at(now).await;

        assert_eq!(report.already_gone, 1);
        assert_eq!(store.fetch_calls(MessageId(4)), 1);
        assert_eq!(store.delete_calls(MessageId(4)), 0);
        assert!(scheduler.index().is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_without_verification_goes_straight_to_delete() {
        let store = MockMessageStore::new();
        let mut config = SweepConfig::new(-1001);
        config.verify_before_delete = false;
        let scheduler = SweepScheduler::new(ExpirationIndex::new(), Arc::new(store.clone()), config);
        let now = Utc::now();
        scheduler.index().put(MessageId(4), now).await;

        scheduler.sweep_at(now).await;

        assert_eq!(store.fetch_calls(MessageId(4)), 0);
        assert_eq!(store.delete_calls(MessageId(4)), 1);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_entry() {
        let store = MockMessageStore::new();
        store.fail_always(MessageId(2), StoreError::permission("not admin"));
        let scheduler = scheduler(&store);
        let now = Utc::now();
        for id in 1..=3 {
            scheduler.index().put(MessageId(id), now).await;
        }

        let report = scheduler.sweep_at(now).await;

        assert_eq!(report.deleted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(scheduler.index().len().await, 1);
        assert!(scheduler.index().get(MessageId(2)).await.is_some());
    }

    #[tokio::test]
    async fn test_slow_delete_times_out_and_is_retained() {
        let store = MockMessageStore::new();
        store.set_latency(Duration::from_millis(200));
        let mut config = SweepConfig::new(-1001);
        config.delete_timeout = Duration::from_millis(20);
        let scheduler = SweepScheduler::new(ExpirationIndex::new(), Arc::new(store.clone()), config);
        let now = Utc::now();
        scheduler.index().put(MessageId(8), now).await;

        let report = scheduler.sweep_at(now).await;

        assert_eq!(report.failed, 1);
        assert!(scheduler.index().get(MessageId(8)).await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_deletes_settle_every_entry() {
        let store = MockMessageStore::new();
        store.set_latency(Duration::from_millis(5));
        let mut config = SweepConfig::new(-1001);
        config.max_concurrent_deletes = 8;
        let scheduler = SweepScheduler::new(ExpirationIndex::new(), Arc::new(store.clone()), config);
        let now = Utc::now();
        for id in 0..40 {
            scheduler.index().put(MessageId(id), now).await;
        }

        let report = scheduler.sweep_at(now).await;

        assert_eq!(report.deleted, 40);
        assert!(scheduler.index().is_empty().await);
        assert_eq!(store.total_delete_calls(), 40);
    }

    #[tokio::test]
    async fn test_reap_drops_only_stale_entries() {
        let store = MockMessageStore::new();
        let scheduler = scheduler(&store);
        let now = Utc::now();
        scheduler
            .index()
            .put(MessageId(1), now - ChronoDuration::days(8))
            .await;
        scheduler
            .index()
            .put(MessageId(2), now - ChronoDuration::days(6))
            .await;
        scheduler
            .index()
            .put(MessageId(3), now + ChronoDuration::hours(1))
            .await;

        let report = scheduler.reap_at(now).await;

        assert_eq!(report, ReapReport { scanned: 3, reaped: 1 });
        assert!(scheduler.index().get(MessageId(1)).await.is_none());
        assert!(scheduler.index().get(MessageId(2)).await.is_some());
        assert!(scheduler.index().get(MessageId(3)).await.is_some());
        assert_eq!(store.total_delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_reap_with_huge_staleness_bound_keeps_everything() {
        let store = MockMessageStore::new();
        let mut config = SweepConfig::new(-1001);
        config.staleness_bound = ChronoDuration::MAX;
        let scheduler = SweepScheduler::new(ExpirationIndex::new(), Arc::new(store.clone()), config);
        let now = Utc::now();
        scheduler
            .index()
            .put(MessageId(1), now - ChronoDuration::days(365))
            .await;

        let report = scheduler.reap_at(now).await;

        assert_eq!(report, ReapReport { scanned: 1, reaped: 0 });
        assert!(scheduler.index().get(MessageId(1)).await.is_some());
    }

    #[tokio::test]
    async fn test_started_scheduler_sweeps_and_shuts_down() {
        let store = MockMessageStore::new();
        let mut config = SweepConfig::new(-1001);
        config.sweep_interval = Duration::from_millis(20);
        config.reap_interval = Duration::from_secs(3600);
        let scheduler = Arc::new(SweepScheduler::new(
            ExpirationIndex::new(),
            Arc::new(store.clone()),
            config,
        ));
        scheduler
            .index()
            .put(MessageId(1), Utc::now() - ChronoDuration::seconds(1))
            .await;

        let handle = Arc::clone(&scheduler).start();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(scheduler.index().is_empty().await);
        assert_eq!(store.delete_calls(MessageId(1)), 1);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            handle.shutdown(Duration::from_secs(2)),
        )
        .await;
        assert!(result.is_ok(), "Scheduler should stop within timeout");
    }
}
