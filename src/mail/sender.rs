//! Outbound reply delivery — HTML mail over an authenticated SMTP relay.

use async_trait::async_trait;
use lettre::message::header;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::config::Config;
use crate::error::SendError;
use crate::mail::ReplySender;

/// SMTP reply sender. Opens one relay session per message sent.
#[derive(Clone)]
pub struct SmtpSender {
    host: String,
    port: u16,
    account: String,
    password: SecretString,
}

impl SmtpSender {
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            account: config.account.clone(),
            password: config.password.clone(),
        }
    }

    fn parse_mailbox(address: &str) -> Result<Mailbox, SendError> {
        address.parse().map_err(|e| SendError::InvalidAddress {
            address: address.to_string(),
            reason: format!("{e}"),
        })
    }

    /// Build and deliver one HTML reply (blocking).
    fn send_blocking(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
        let message = Message::builder()
            .from(Self::parse_mailbox(&self.account)?)
            .to(Self::parse_mailbox(to)?)
            .subject(subject)
            .header(header::ContentType::TEXT_HTML)
            .body(html_envelope(body))
            .map_err(|e| SendError::BuildFailed {
                recipient: to.to_string(),
                reason: format!("{e}"),
            })?;

        let creds = Credentials::new(
            self.account.clone(),
            self.password.expose_secret().to_string(),
        );

        // relay() is implicit TLS — port 465 by default.
        let transport = SmtpTransport::relay(&self.host)
            .map_err(|e| SendError::Relay(format!("{e}")))?
            .port(self.port)
            .credentials(creds)
            .build();

        transport.send(&message).map_err(|e| SendError::SendFailed {
            recipient: to.to_string(),
            reason: format!("{e}"),
        })?;

        info!("Sent reply to {to}");
        Ok(())
    }
}

#[async_trait]
impl ReplySender for SmtpSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
        self.send_blocking(to, subject, body)
    }
}

/// Wrap plaintext in the right-to-left HTML reply envelope, converting
/// newlines to line breaks.
pub fn html_envelope(text: &str) -> String {
    let formatted = text.replace('\n', "<br>");
    format!(
        "<html>\n<body style=\"direction: rtl; text-align: right; font-family: Arial, sans-serif;\">\n{formatted}\n</body>\n</html>"
    )
}
