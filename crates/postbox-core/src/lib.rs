//! postbox-core
//!
//! Queue-draining email dispatcher: rows in a `queued_emails` table move
//! `Queued -> InFlight -> Delivered`, one conditional update at a time.
//!
//! # Modules
//! - **domain**: status model, ids, message records
//! - **ports**: `MessageStore`, `MailTransport`, `Clock`, `IdGenerator`
//! - **app**: scanner, claim, delivery, recorder, poll driver, reaper, builder
//! - **impls**: SQLite and in-memory stores, log transport
//! - **config**: TOML configuration
//! - **error**: error enums

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use app::{Postbox, PostboxBuilder, PostboxHandle};
pub use config::PostboxConfig;
pub use error::PostboxError;
