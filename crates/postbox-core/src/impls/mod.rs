//! Impls - concrete adapters for the ports.
//!
//! # Included
//! - **SqliteStore**: the `queued_emails` table (production)
//! - **InMemoryStore**: map-backed store (tests, embedding)
//! - **LogTransport**: logs mail instead of sending it

pub mod log_transport;
pub mod memory_store;
pub mod sqlite_store;

pub use self::log_transport::LogTransport;
pub use self::memory_store::InMemoryStore;
pub use self::sqlite_store::SqliteStore;
