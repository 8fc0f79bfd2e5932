//! Mailbox I/O — IMAP fetch for inbound, SMTP via lettre for outbound.

pub mod fetcher;
pub mod sender;
pub mod types;

pub use fetcher::ImapFetcher;
pub use sender::SmtpSender;
pub use types::InboundMessage;

use async_trait::async_trait;

use crate::error::{FetchError, SendError};

/// Source of unread mail. One fetch per pipeline run.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Return every currently-unseen message, marking each seen on the
    /// server as a side effect of the read.
    async fn fetch_unseen(&self) -> Result<Vec<InboundMessage>, FetchError>;
}

/// Outbound reply delivery.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError>;
}
