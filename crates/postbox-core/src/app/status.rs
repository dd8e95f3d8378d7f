//! Status - queue depth by status.

use serde::Serialize;

use crate::domain::DeliveryStatus;
use crate::error::StoreError;
use crate::ports::MessageStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub in_flight: usize,
    pub delivered: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.queued + self.in_flight + self.delivered
    }

    fn bump(&mut self, status: DeliveryStatus) {
        match status {
            DeliveryStatus::Queued => self.queued += 1,
            DeliveryStatus::InFlight => self.in_flight += 1,
            DeliveryStatus::Delivered => self.delivered += 1,
        }
    }
}

/// Count every row by its current status.
pub async fn status_counts(store: &dyn MessageStore) -> Result<QueueCounts, StoreError> {
    let records = store.list_all().await?;
    let mut counts = QueueCounts::default();
    for record in &records {
        counts.bump(record.status);
    }
    Ok(counts)
}
