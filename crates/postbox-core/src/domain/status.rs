//! Delivery status state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Delivery state of one queued message.
///
/// State transitions:
/// - Queued -> InFlight (claimed by a poll cycle)
/// - InFlight -> Delivered (transport accepted the message)
///
/// Nothing moves a row back to `Queued` except the explicit recovery sweep,
/// which goes through [`DeliveryStatus::can_reset_to`] instead of the
/// forward table.
///
/// The numeric codes are what the `status` column stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Inserted by a producer, waiting for a poll cycle.
    Queued,

    /// Claimed; a delivery attempt is in progress (or was abandoned).
    InFlight,

    /// Transport confirmed the send.
    Delivered,
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal status transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
}

impl DeliveryStatus {
    pub const QUEUED_CODE: i64 = 0;
    pub const IN_FLIGHT_CODE: i64 = 2;
    pub const DELIVERED_CODE: i64 = 3;

    /// Column value for this status.
    pub fn code(self) -> i64 {
        match self {
            DeliveryStatus::Queued => Self::QUEUED_CODE,
            DeliveryStatus::InFlight => Self::IN_FLIGHT_CODE,
            DeliveryStatus::Delivered => Self::DELIVERED_CODE,
        }
    }

    /// Decode a column value. Unknown codes yield `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            Self::QUEUED_CODE => Some(DeliveryStatus::Queued),
            Self::IN_FLIGHT_CODE => Some(DeliveryStatus::InFlight),
            Self::DELIVERED_CODE => Some(DeliveryStatus::Delivered),
            _ => None,
        }
    }

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered)
    }

    /// Is this row eligible for a scan?
    pub fn is_scannable(self) -> bool {
        matches!(self, DeliveryStatus::Queued)
    }

    /// Forward transition table.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        matches!(
            (self, next),
            (DeliveryStatus::Queued, DeliveryStatus::InFlight)
                | (DeliveryStatus::InFlight, DeliveryStatus::Delivered)
        )
    }

    /// Recovery edge used only by the requeue sweep.
    pub fn can_reset_to(self, next: DeliveryStatus) -> bool {
        matches!(
            (self, next),
            (DeliveryStatus::InFlight, DeliveryStatus::Queued)
        )
    }

    /// Validate a forward transition.
    pub fn transition(self, next: DeliveryStatus) -> Result<DeliveryStatus, IllegalTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Queued => "queued",
            DeliveryStatus::InFlight => "in_flight",
            DeliveryStatus::Delivered => "delivered",
        };
        f.write_str(s)
    }
}
