//! LogTransport - writes each mail to the log instead of a mail server.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::ports::{MailTransport, OutgoingMail};

/// Console transport. Always succeeds unless the address is obviously
/// unusable (no `@`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

impl LogTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        if !mail.to_address.contains('@') {
            return Err(TransportError::Rejected(format!(
                "malformed address {:?}",
                mail.to_address
            )));
        }

        tracing::info!(
            to = %mail.to_address,
            name = %mail.to_name,
            from = %mail.from,
            subject = %mail.subject,
            "sending email"
        );
        Ok(())
    }
}
