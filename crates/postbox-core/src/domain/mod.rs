//! Domain model: ids, delivery status, message shapes.

pub mod ids;
pub mod message;
pub mod status;

pub use ids::{CycleId, MessageId};
pub use message::{MessageRecord, NewMessage, QueuedMessage};
pub use status::{DeliveryStatus, IllegalTransition};
