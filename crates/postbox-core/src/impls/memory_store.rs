//! In-memory message store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{DeliveryStatus, MessageId, MessageRecord, NewMessage, QueuedMessage};
use crate::error::StoreError;
use crate::ports::MessageStore;
use crate::ports::store::check_transition;

struct InMemoryStoreState {
    /// All rows, keyed (and therefore ordered) by id.
    records: BTreeMap<MessageId, MessageRecord>,

    /// Next id to assign. Never reused.
    next_id: u64,
}

impl InMemoryStoreState {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_id);
        self.next_id += 1;
        id
    }
}

/// `MessageStore` backed by a map behind one async mutex.
///
/// Each method takes the lock once, which gives the same atomic single-row
/// semantics a relational store would. Clones share the same rows.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryStoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryStoreState::new())),
        }
    }

    /// Current status of one row.
    pub async fn status_of(&self, id: MessageId) -> Option<DeliveryStatus> {
        let state = self.state.lock().await;
        state.records.get(&id).map(|r| r.status)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn scan_queued(&self, limit: usize) -> Result<Vec<QueuedMessage>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .values()
            .filter(|r| r.status.is_scannable())
            .take(limit)
            .map(MessageRecord::projection)
            .collect())
    }

    async fn transition(
        &self,
        id: MessageId,
        from: DeliveryStatus,
        to: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        check_transition(id, from, to)?;

        let mut state = self.state.lock().await;
        let Some(record) = state.records.get_mut(&id) else {
            return Ok(false);
        };
        if record.status != from {
            return Ok(false);
        }

        record.status = to;
        if to == DeliveryStatus::InFlight {
            record.claimed_at = Some(at);
        }
        Ok(true)
    }

    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<MessageId>, StoreError> {
        let mut state = self.state.lock().await;
        let mut requeued = Vec::new();
        for record in state.records.values_mut() {
            let stale = record.status.can_reset_to(DeliveryStatus::Queued)
                && record.claimed_at.is_some_and(|t| t < cutoff);
            if stale {
                record.status = DeliveryStatus::Queued;
                record.claimed_at = None;
                requeued.push(record.id);
            }
        }
        Ok(requeued)
    }

    async fn insert(&self, message: NewMessage) -> Result<MessageId, StoreError> {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        state.records.insert(id, MessageRecord::new(id, message));
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<MessageRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.records.values().cloned().collect())
    }
}
