//! Ports - the seams to external systems.
//!
//! Each trait stands in for something outside the dispatcher (the relational
//! table, the mail channel, wall-clock time) so the app layer can be driven
//! against in-memory fakes.

pub mod clock;
pub mod id_generator;
pub mod store;
pub mod transport;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::store::MessageStore;
pub use self::transport::{MailTemplate, MailTransport, OutgoingMail};
