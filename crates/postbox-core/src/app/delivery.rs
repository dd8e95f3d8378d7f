//! DeliveryWorker - one send attempt for one claimed message.

use std::sync::Arc;

use super::recorder::{OutcomeRecorder, RecordOutcome};
use crate::domain::QueuedMessage;
use crate::ports::{MailTemplate, MailTransport};

/// What happened to one claimed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryReport {
    /// Sent and recorded as `Delivered`.
    Delivered,

    /// Transport returned an error. The row stays `InFlight`.
    SendFailed,

    /// Sent, but the `Delivered` write did not land.
    RecordFailed,
}

/// Composes, sends, and records.
///
/// Cheap to clone; the poll driver hands a clone to every spawned task.
#[derive(Clone)]
pub struct DeliveryWorker {
    transport: Arc<dyn MailTransport>,
    template: Arc<MailTemplate>,
    recorder: Arc<OutcomeRecorder>,
}

impl DeliveryWorker {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        template: MailTemplate,
        recorder: Arc<OutcomeRecorder>,
    ) -> Self {
        Self {
            transport,
            template: Arc::new(template),
            recorder,
        }
    }

    pub async fn deliver(&self, message: QueuedMessage) -> DeliveryReport {
        let mail = self.template.compose(&message);

        if let Err(err) = self.transport.send(&mail).await {
            // No requeue here: the row is left InFlight and only the
            // optional reaper can return it to the scan set.
            tracing::warn!(
                message_id = %message.id,
                to = %message.recipient_address,
                error = %err,
                "send failed, message left in flight"
            );
            return DeliveryReport::SendFailed;
        }

        match self.recorder.record_delivered(message.id).await {
            RecordOutcome::Recorded => DeliveryReport::Delivered,
            RecordOutcome::NotInFlight | RecordOutcome::Failed => DeliveryReport::RecordFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{RecordingTransport, seeded_store, template};
    use crate::domain::{DeliveryStatus, MessageId};
    use crate::ports::{MessageStore, SystemClock};
    use chrono::Utc;

    async fn claimed_message(store: &dyn MessageStore, id: MessageId) -> QueuedMessage {
        store
            .transition(id, DeliveryStatus::Queued, DeliveryStatus::InFlight, Utc::now())
            .await
            .unwrap();
        store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.id == id)
            .unwrap()
            .projection()
    }

    #[tokio::test]
    async fn successful_send_is_recorded() {
        let store = seeded_store(1).await;
        let message = claimed_message(&store, MessageId::new(1)).await;
        let transport = RecordingTransport::new();
        let recorder = Arc::new(OutcomeRecorder::new(
            Arc::new(store.clone()),
            Arc::new(SystemClock),
        ));
        let worker = DeliveryWorker::new(Arc::new(transport.clone()), template(), recorder);

        assert_eq!(worker.deliver(message).await, DeliveryReport::Delivered);
        assert_eq!(
            store.status_of(MessageId::new(1)).await,
            Some(DeliveryStatus::Delivered)
        );

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_address, "user0@example.com");
        assert_eq!(sent[0].subject, "Hello user0");
    }

    #[tokio::test]
    async fn failed_send_leaves_row_in_flight() {
        let store = seeded_store(1).await;
        let message = claimed_message(&store, MessageId::new(1)).await;
        let transport = RecordingTransport::new();
        transport.fail_for("user0@example.com").await;
        let recorder = Arc::new(OutcomeRecorder::new(
            Arc::new(store.clone()),
            Arc::new(SystemClock),
        ));
        let worker = DeliveryWorker::new(Arc::new(transport.clone()), template(), recorder);

        assert_eq!(worker.deliver(message).await, DeliveryReport::SendFailed);
        assert_eq!(
            store.status_of(MessageId::new(1)).await,
            Some(DeliveryStatus::InFlight)
        );
        assert!(transport.sent().await.is_empty());
    }
}
