//! MailTransport port - the channel a delivery worker sends through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::QueuedMessage;
use crate::error::TransportError;

/// A composed mail ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to_name: String,
    pub to_address: String,
    pub subject: String,
    pub body: String,
}

/// Content template applied to every queued message.
///
/// `{name}` in the subject or body is replaced with the recipient name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailTemplate {
    pub from: String,
    pub subject: String,
    pub body: String,
}

impl MailTemplate {
    pub fn compose(&self, message: &QueuedMessage) -> OutgoingMail {
        OutgoingMail {
            from: self.from.clone(),
            to_name: message.recipient_name.clone(),
            to_address: message.recipient_address.clone(),
            subject: self.subject.replace("{name}", &message.recipient_name),
            body: self.body.replace("{name}", &message.recipient_name),
        }
    }
}

/// Sends one mail.
///
/// Synchronous from the worker's point of view: the worker awaits the result
/// before deciding whether to record delivery. Retries, if any, are the
/// transport's business.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;

    #[test]
    fn compose_substitutes_name() {
        let template = MailTemplate {
            from: "noreply@example.com".to_string(),
            subject: "Hello {name}".to_string(),
            body: "Dear {name},\r\nthanks.".to_string(),
        };
        let message = QueuedMessage {
            id: MessageId::new(1),
            recipient_name: "Ada".to_string(),
            recipient_address: "ada@example.com".to_string(),
        };

        let mail = template.compose(&message);
        assert_eq!(mail.subject, "Hello Ada");
        assert_eq!(mail.body, "Dear Ada,\r\nthanks.");
        assert_eq!(mail.to_address, "ada@example.com");
        assert_eq!(mail.from, "noreply@example.com");
    }
}
