//! OutcomeRecorder - mark a sent message as delivered (InFlight -> Delivered).

use std::sync::Arc;

use crate::domain::{DeliveryStatus, MessageId};
use crate::ports::{Clock, MessageStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,

    /// The row was not `InFlight` when the write landed.
    NotInFlight,

    /// Store write failed.
    Failed,
}

/// Records successful delivery.
///
/// Failures are logged and not retried: the mail already left, so the row is
/// left `InFlight`, outside the scan set, rather than risk a second send.
pub struct OutcomeRecorder {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
}

impl OutcomeRecorder {
    pub fn new(store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn record_delivered(&self, id: MessageId) -> RecordOutcome {
        let result = self
            .store
            .transition(
                id,
                DeliveryStatus::InFlight,
                DeliveryStatus::Delivered,
                self.clock.now(),
            )
            .await;

        match result {
            Ok(true) => {
                tracing::info!(message_id = %id, "delivered");
                RecordOutcome::Recorded
            }
            Ok(false) => {
                tracing::error!(
                    message_id = %id,
                    "sent but row was not in flight, delivery not recorded"
                );
                RecordOutcome::NotInFlight
            }
            Err(err) => {
                tracing::error!(
                    message_id = %id,
                    error = %err,
                    "sent but failed to record delivery, row stays in flight"
                );
                RecordOutcome::Failed
            }
        }
    }
}
