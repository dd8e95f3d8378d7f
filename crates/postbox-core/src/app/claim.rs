//! ClaimStep - reserve one candidate for dispatch (Queued -> InFlight).

use std::sync::Arc;

use crate::domain::{DeliveryStatus, MessageId};
use crate::ports::{Clock, MessageStore};

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This cycle owns the row; a worker may be started.
    Claimed,

    /// The row was no longer `Queued` at write time.
    AlreadyClaimed,

    /// Store write failed; the row stays `Queued` for the next cycle.
    Failed,
}

/// Conditional single-row update `Queued -> InFlight`.
///
/// Must complete before a delivery worker is started for the row.
pub struct ClaimStep {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
}

impl ClaimStep {
    pub fn new(store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn claim(&self, id: MessageId) -> ClaimOutcome {
        let result = self
            .store
            .transition(
                id,
                DeliveryStatus::Queued,
                DeliveryStatus::InFlight,
                self.clock.now(),
            )
            .await;

        match result {
            Ok(true) => {
                tracing::debug!(message_id = %id, "claimed");
                ClaimOutcome::Claimed
            }
            Ok(false) => {
                tracing::debug!(message_id = %id, "already claimed, skipping");
                ClaimOutcome::AlreadyClaimed
            }
            Err(err) => {
                tracing::warn!(
                    message_id = %id,
                    error = %err,
                    "claim failed, will retry next cycle"
                );
                ClaimOutcome::Failed
            }
        }
    }
}
