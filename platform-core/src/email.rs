//! SMTP dispatch for the Form-Handler Engine
//!
//! Concrete [`lettre`]-backed sender used by [`crate::forms::handle_submission`]'s
//! injectable `send` parameter. Gated behind the `email` feature so crates
//! embedding only the serving core needn't pull in an SMTP stack.

use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{Error, Result};

/// SMTP transport configuration for outbound form-handler notifications.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
}

/// Thin wrapper around an async SMTP transport.
#[derive(Clone)]
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let creds = lettre::transport::smtp::authentication::Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| Error::EmailTransportUnavailable(format!("failed to configure SMTP relay: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let from = config
            .from_address
            .parse()
            .map_err(|e| Error::EmailTransportUnavailable(format!("invalid from address: {e}")))?;

        Ok(Self { transport, from })
    }

    /// Send a form-handler notification composed of an HTML and plain-text
    /// alternative, to `destination`, with an optional `Reply-To`.
    pub async fn send(
        &self,
        destination: String,
        html_body: String,
        text_body: String,
        reply_to: Option<String>,
    ) -> Result<()> {
        let to: Mailbox = destination
            .parse()
            .map_err(|e| Error::BadRequest(format!("invalid destination email: {e}")))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("New form submission");

        if let Some(reply_to) = reply_to {
            if let Ok(mailbox) = reply_to.parse::<Mailbox>() {
                builder = builder.reply_to(mailbox);
            }
        }

        let message = builder
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(lettre::message::SinglePart::plain(text_body))
                    .singlepart(lettre::message::SinglePart::html(html_body)),
            )
            .map_err(|e| Error::EmailTransportUnavailable(format!("failed to build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Error::EmailTransportUnavailable(format!("SMTP dispatch failed: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_from_address_is_rejected_at_construction() {
        let config = EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "user".to_string(),
            smtp_password: "pass".to_string(),
            from_address: "not-an-email".to_string(),
        };
        assert!(SmtpEmailSender::new(&config).is_err());
    }

    #[test]
    fn valid_config_constructs_sender() {
        let config = EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "user".to_string(),
            smtp_password: "pass".to_string(),
            from_address: "forms@example.com".to_string(),
        };
        assert!(SmtpEmailSender::new(&config).is_ok());
    }
}
