//! In-memory expiration index
//!
//! Maps each tracked message to the instant it becomes eligible for deletion.
//! The index is written by ingestion and read/purged by the sweep and the
//! reaper. Cloning an `ExpirationIndex` shares the same underlying map.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

pub mod types;

pub use types::{ExpirationEntry, MessageId};

#[derive(Debug, Clone, Default)]
pub struct ExpirationIndex {
    entries: Arc<RwLock<HashMap<MessageId, DateTime<Utc>>>>,
}

impl ExpirationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, overwriting any previous `delete_at` for the same id.
    pub async fn put(&self, message_id: MessageId, delete_at: DateTime<Utc>) {
        let mut guard = self.entries.write().await;
        guard.insert(message_id, delete_at);
    }

    /// Removes an entry. Returns false if it was not tracked.
    pub async fn remove(&self, message_id: MessageId) -> bool {
        let mut guard = self.entries.write().await;
        guard.remove(&message_id).is_some()
    }

    pub async fn get(&self, message_id: MessageId) -> Option<DateTime<Utc>> {
        self.entries.read().await.get(&message_id).copied()
    }

    /// Copies the current state out of the lock.
    ///
    /// The returned snapshot is detached from the index: later inserts and
    /// removals do not affect it, and it can be iterated more than once.
    pub async fn snapshot(&self) -> Snapshot {
        let guard = self.entries.read().await;
        let entries = guard
            .iter()
            .map(|(id, delete_at)| ExpirationEntry::new(*id, *delete_at))
            .collect();
        Snapshot { entries }
    }

    /// Drops every entry that is stale as of `cutoff`.
    ///
    /// Scan and removal happen under one write lock. Returns the number of
    /// entries held before the pass and the number dropped.
    pub async fn retain_newer_than(&self, cutoff: DateTime<Utc>) -> (usize, usize) {
        let mut guard = self.entries.write().await;
        let before = guard.len();
        guard.retain(|&message_id, &mut delete_at| {
            !ExpirationEntry::new(message_id, delete_at).is_stale(cutoff)
        });
        (before, before - guard.len())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Point-in-time copy of the index. No ordering guarantee.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<ExpirationEntry>,
}

impl Snapshot {
    pub fn iter(&self) -> impl Iterator<Item = &ExpirationEntry> {
        self.entries.iter()
    }

    /// Entries that are due at `now`.
    pub fn eligible_at(&self, now: DateTime<Utc>) -> impl Iterator<Item = &ExpirationEntry> {
        self.entries.iter().filter(move |e| e.is_eligible(now))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Snapshot {
    type Item = ExpirationEntry;
    type IntoIter = std::vec::IntoIter<ExpirationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_put_and_get() {
        let index = ExpirationIndex::new();
        let at = Utc::now();

        index.put(MessageId(1), at).await;

        assert_eq!(index.get(MessageId(1)).await, Some(at));
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_entry() {
        let index = ExpirationIndex::new();
        let first = Utc::now();
        let second = first + Duration::hours(1);

        index.put(MessageId(1), first).await;
        index.put(MessageId(1), second).await;

        assert_eq!(index.len().await, 1);
        assert_eq!(index.get(MessageId(1)).await, Some(second));
    }

    #[tokio::test]
    async fn test_remove_missing_is_noop() {
        let index = ExpirationIndex::new();
        index.put(MessageId(1), Utc::now()).await;

        assert!(!index.remove(MessageId(2)).await);
        assert_eq!(index.len().await, 1);

        assert!(index.remove(MessageId(1)).await);
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_index() {
        let index = ExpirationIndex::new();
        let at = Utc::now();
        index.put(MessageId(1), at).await;
        index.put(MessageId(2), at).await;

        let snapshot = index.snapshot().await;
        index.remove(MessageId(1)).await;
        index.put(MessageId(3), at).await;

        assert_eq!(snapshot.len(), 2);
        let mut ids: Vec<_> = snapshot.iter().map(|e| e.message_id).collect();
        ids.sort();
        assert_eq!(ids, vec![MessageId(1), MessageId(2)]);
    }

    #[tokio::test]
    async fn test_snapshot_iterates_more_than_once() {
        let index = ExpirationIndex::new();
        index.put(MessageId(1), Utc::now()).await;

        let snapshot = index.snapshot().await;
        assert_eq!(snapshot.iter().count(), 1);
        assert_eq!(snapshot.iter().count(), 1);
        assert_eq!(snapshot.into_iter().count(), 1);
    }

    #[tokio::test]
    async fn test_eligible_at_filters_future_entries() {
        let index = ExpirationIndex::new();
        let now = Utc::now();
        index.put(MessageId(1), now - Duration::minutes(1)).await;
        index.put(MessageId(2), now).await;
        index.put(MessageId(3), now + Duration::minutes(1)).await;

        let snapshot = index.snapshot().await;
        let mut eligible: Vec<_> = snapshot.eligible_at(now).map(|e| e.message_id).collect();
        eligible.sort();

        assert_eq!(eligible, vec![MessageId(1), MessageId(2)]);
    }

    #[tokio::test]
    async fn test_retain_newer_than() {
        let index = ExpirationIndex::new();
        let cutoff = Utc::now();
        index.put(MessageId(1), cutoff - Duration::days(1)).await;
        index.put(MessageId(2), cutoff).await;
        index.put(MessageId(3), cutoff + Duration::days(1)).await;

        let (before, dropped) = index.retain_newer_than(cutoff).await;

        assert_eq!(before, 3);
        assert_eq!(dropped, 1);
        assert_eq!(index.len().await, 2);
        assert!(index.get(MessageId(1)).await.is_none());
        assert!(index.get(MessageId(2)).await.is_some());
        assert!(index.get(MessageId(3)).await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_put_and_remove() {
        let index = ExpirationIndex::new();
        let at = Utc::now();

        let mut handles = Vec::new();
        for i in 0..50 {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                index.put(MessageId(i), at).await;
                if i % 2 == 0 {
                    index.remove(MessageId(i)).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(index.len().await, 25);
    }
}
