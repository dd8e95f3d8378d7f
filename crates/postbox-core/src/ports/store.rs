//! MessageStore port - the relational table that holds queued mail.
//!
//! Every method is one independent statement against the store. Nothing here
//! spans scan+claim or claim+deliver+record in a transaction; each status
//! change is its own atomic single-row write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DeliveryStatus, MessageId, MessageRecord, NewMessage, QueuedMessage};
use crate::error::StoreError;

/// Source of truth for message rows and their status.
///
/// Implementations must make [`MessageStore::transition`] a conditional
/// update (`... WHERE id = ? AND status = ?`) and report whether a row was
/// affected. That is what keeps two cycles from claiming the same row.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Up to `limit` rows currently `Queued`, in id order.
    async fn scan_queued(&self, limit: usize) -> Result<Vec<QueuedMessage>, StoreError>;

    /// Move `id` from `from` to `to` if it is still in `from`.
    ///
    /// Returns `Ok(false)` when no row matched (already moved, or missing).
    /// `at` is recorded as the claim time when `to` is `InFlight`.
    /// Returns `StoreError::IllegalTransition` without touching the store if
    /// `from -> to` is not in the forward table.
    async fn transition(
        &self,
        id: MessageId,
        from: DeliveryStatus,
        to: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Reset every `InFlight` row claimed before `cutoff` back to `Queued`.
    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<MessageId>, StoreError>;

    /// Insert a new `Queued` row.
    async fn insert(&self, message: NewMessage) -> Result<MessageId, StoreError>;

    /// Every row, in id order.
    async fn list_all(&self) -> Result<Vec<MessageRecord>, StoreError>;
}

/// Shared guard for store implementations.
pub(crate) fn check_transition(
    id: MessageId,
    from: DeliveryStatus,
    to: DeliveryStatus,
) -> Result<(), StoreError> {
    from.transition(to)
        .map(|_| ())
        .map_err(|e| StoreError::IllegalTransition {
            id,
            from: e.from,
            to: e.to,
        })
}
