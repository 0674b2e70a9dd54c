//! In-memory message store for testing
//!
//! Behaves like a remote store that remembers which messages it has deleted:
//! deleting the same id twice yields `NotFound` the second time. Individual
//! ids can be scripted with a queue of outcomes to simulate failures.
//!
//! # Example
//!
//! ```rust
//! use autopurge::index::MessageId;
//! use autopurge::store::mock::MockMessageStore;
//! use autopurge::store::{DeleteOutcome, MessageStore, StoreError};
//!
//! async fn example() {
//!     let store = MockMessageStore::new();
//!     store.push_outcome(MessageId(1), DeleteOutcome::Failed(StoreError::network("reset")));
//!
//!     assert!(matches!(store.delete_message(0, MessageId(1)).await, DeleteOutcome::Failed(_)));
//!     assert_eq!(store.delete_message(0, MessageId(1)).await, DeleteOutcome::Deleted);
//!     assert_eq!(store.delete_message(0, MessageId(1)).await, DeleteOutcome::NotFound);
//! }
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::index::MessageId;
use crate::store::error::{self, StoreError};
use crate::store::{DeleteOutcome, MessageStore};

#[derive(Debug, Clone, Default)]
pub struct MockMessageStore {
    /// Scripted outcomes, consumed front to back per id
    scripted: Arc<Mutex<HashMap<MessageId, VecDeque<DeleteOutcome>>>>,
    /// Ids the store no longer holds
    gone: Arc<Mutex<HashSet<MessageId>>>,
    /// Delete calls per id
    delete_calls: Arc<Mutex<HashMap<MessageId, usize>>>,
    /// Fetch calls per id
    fetch_calls: Arc<Mutex<HashMap<MessageId, usize>>>,
    /// Artificial latency applied to every delete
    latency: Arc<Mutex<Option<Duration>>>,
}

impl MockMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an outcome for the next delete of `message_id`.
    pub fn push_outcome(&self, message_id: MessageId, outcome: DeleteOutcome) {
        self.scripted
            .lock()
            .unwrap()
            .entry(message_id)
            .or_default()
            .push_back(outcome);
    }

    /// Queues the same failure `times` times for `message_id`.
    pub fn fail_times(&self, message_id: MessageId, times: usize, err: StoreError) {
        for _ in 0..times {
            self.push_outcome(message_id, DeleteOutcome::Failed(err.clone()));
        }
    }

    /// Makes every delete of `message_id` fail with `err`.
    pub fn fail_always(&self, message_id: MessageId, err: StoreError) {
        self.fail_times(message_id, 10_000, err);
    }

    /// Marks a message as already removed out-of-band.
    pub fn mark_gone(&self, message_id: MessageId) {
        self.gone.lock().unwrap().insert(message_id);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn delete_calls(&self, message_id: MessageId) -> usize {
        self.delete_calls
            .lock()
            .unwrap()
            .get(&message_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_delete_calls(&self) -> usize {
        self.delete_calls.lock().unwrap().values().sum()
    }

    pub fn fetch_calls(&self, message_id: MessageId) -> usize {
        self.fetch_calls
            .lock()
            .unwrap()
            .get(&message_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_gone(&self, message_id: MessageId) -> bool {
        self.gone.lock().unwrap().contains(&message_id)
    }
}

#[async_trait]
impl MessageStore for MockMessageStore {
    async fn fetch_message(&self, _channel_id: i64, message_id: MessageId) -> error::Result<()> {
        *self
            .fetch_calls
            .lock()
            .unwrap()
            .entry(message_id)
            .or_insert(0) += 1;

        if self.is_gone(message_id) {
            Err(StoreError::not_found(format!("message {} not found", message_id)))
        } else {
            Ok(())
        }
    }

    async fn delete_message(&self, _channel_id: i64, message_id: MessageId) -> DeleteOutcome {
        *self
            .delete_calls
            .lock()
            .unwrap()
            .entry(message_id)
            .or_insert(0) += 1;

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(&message_id)
            .and_then(|queue| queue.pop_front());

        let outcome = match scripted {
            Some(outcome) => outcome,
            None if self.is_gone(message_id) => DeleteOutcome::NotFound,
            None => DeleteOutcome::Deleted,
        };

        if matches!(outcome, DeleteOutcome::Deleted | DeleteOutcome::NotFound) {
            self.mark_gone(message_id);
        }

        outcome
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}
