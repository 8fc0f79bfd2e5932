//! Inbound message type and MIME body extraction.

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, PartType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subject used when the header is absent.
pub const DEFAULT_SUBJECT: &str = "(no subject)";

/// One unread message pulled from the mailbox.
///
/// Transient — lives for a single pipeline run, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender address (bare address, no display name).
    pub sender: String,
    /// Subject line, defaulted when absent.
    pub subject: String,
    /// Best-effort plaintext body (raw HTML when no plaintext part exists).
    pub body: String,
    /// Message-ID header, or a generated `gen-<uuid>` placeholder.
    pub message_id: String,
    /// Date header, falling back to the fetch time.
    pub received_at: DateTime<Utc>,
}

/// Parse a raw RFC822 message into an [`InboundMessage`].
///
/// Returns `None` when the bytes don't parse as a message at all;
/// individual missing headers are defaulted instead.
pub fn parse_inbound(raw: &[u8]) -> Option<InboundMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into());

    let subject = parsed.subject().unwrap_or(DEFAULT_SUBJECT).to_string();

    let message_id = parsed
        .message_id()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));

    let received_at = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    Some(InboundMessage {
        sender,
        subject,
        body: extract_body(&parsed),
        message_id,
        received_at,
    })
}

/// Extract a reply prompt from a parsed message.
///
/// Concatenates the decoded text of every `text/plain` part in part order.
/// When no plaintext part exists, falls back to the decoded markup of the
/// first `text/html` part. Charset decoding (and discarding of undecodable
/// bytes) is handled by mail-parser.
pub fn extract_body(parsed: &mail_parser::Message) -> String {
    let mut plain = String::new();
    let mut html: Option<String> = None;

    for part in &parsed.parts {
        match &part.body {
            PartType::Text(text) => plain.push_str(text),
            PartType::Html(markup) if html.is_none() => html = Some(markup.to_string()),
            _ => {}
        }
    }

    if plain.is_empty() {
        html.unwrap_or_default()
    } else {
        plain
    }
}
