//! Queued message shapes: producer input, scan projection, full row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeliveryStatus, MessageId};

/// Producer input. The store assigns the id and starts the row as `Queued`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub recipient_name: String,
    pub recipient_address: String,
}

impl NewMessage {
    pub fn new(recipient_name: impl Into<String>, recipient_address: impl Into<String>) -> Self {
        Self {
            recipient_name: recipient_name.into(),
            recipient_address: recipient_address.into(),
        }
    }
}

/// Read projection returned by a scan.
///
/// Status is not carried: every projection a scan yields was `Queued` at
/// read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: MessageId,
    pub recipient_name: String,
    pub recipient_address: String,
}

/// Full row, as listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub recipient_name: String,
    pub recipient_address: String,
    pub status: DeliveryStatus,

    /// When the row last moved Queued -> InFlight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl MessageRecord {
    pub fn new(id: MessageId, message: NewMessage) -> Self {
        Self {
            id,
            recipient_name: message.recipient_name,
            recipient_address: message.recipient_address,
            status: DeliveryStatus::Queued,
            claimed_at: None,
        }
    }

    pub fn projection(&self) -> QueuedMessage {
        QueuedMessage {
            id: self.id,
            recipient_name: self.recipient_name.clone(),
            recipient_address: self.recipient_address.clone(),
        }
    }
}
