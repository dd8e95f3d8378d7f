use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{DeliveryStatus, MessageId};

/// Failure reported by a [`MessageStore`](crate::ports::MessageStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("illegal transition for {id}: {from} -> {to}")]
    IllegalTransition {
        id: MessageId,
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("unknown status code {0} in store")]
    UnknownStatusCode(i64),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Failure reported by a [`MailTransport`](crate::ports::MailTransport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("recipient rejected: {0}")]
    Rejected(String),

    #[error("transport unreachable: {0}")]
    Unreachable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Startup failure: bad config or a store that cannot be opened.
#[derive(Debug, Error)]
pub enum PostboxError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
