//! Mailbox fetcher — raw IMAP over rustls, one blocking session per run.
//!
//! The session is a plain tagged-command loop: LOGIN, SELECT, SEARCH
//! UNSEEN, then FETCH + STORE per message. Fetching RFC822 already flags
//! the message `\Seen` on most servers; the STORE makes it explicit, so a
//! fetched-but-not-replied-to message is never retried on a later run.

use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::mail::types::{self, InboundMessage};
use crate::mail::MailSource;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// IMAP mailbox fetcher.
#[derive(Clone)]
pub struct ImapFetcher {
    host: String,
    port: u16,
    account: String,
    password: SecretString,
}

impl ImapFetcher {
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.imap_host.clone(),
            port: config.imap_port,
            account: config.account.clone(),
            password: config.password.clone(),
        }
    }

    /// Open a TLS connection to the mailbox host.
    fn connect(&self) -> Result<TlsStream, FetchError> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port))?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        );
        let server_name = rustls::pki_types::ServerName::try_from(self.host.clone())
            .map_err(|e| FetchError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| FetchError::Tls(e.to_string()))?;

        Ok(rustls::StreamOwned::new(conn, tcp))
    }

    /// Run one full fetch session (blocking — call from `spawn_blocking`).
    fn fetch_blocking(&self) -> Result<Vec<InboundMessage>, FetchError> {
        debug!("Connecting to {}:{}", self.host, self.port);
        let stream = self.connect()?;
        let mut session = ImapSession::new(stream);

        let _greeting = session.read_line()?;

        let login = session.command(&format!(
            "LOGIN \"{}\" \"{}\"",
            self.account,
            self.password.expose_secret()
        ))?;
        if !tagged_ok(&login) {
            return Err(FetchError::AuthFailed {
                account: self.account.clone(),
            });
        }

        let select = session.command("SELECT \"INBOX\"")?;
        if !tagged_ok(&select) {
            return Err(FetchError::Protocol("SELECT INBOX failed".into()));
        }

        let search = session.command("SEARCH UNSEEN")?;
        if !tagged_ok(&search) {
            return Err(FetchError::Protocol("SEARCH UNSEEN failed".into()));
        }
        let ids = parse_search_ids(&search);
        debug!("Found {} unseen message(s)", ids.len());

        let mut messages = Vec::new();
        for id in &ids {
            let fetch = session.command(&format!("FETCH {id} RFC822"))?;
            match types::parse_inbound(message_source(&fetch).as_bytes()) {
                Some(msg) => messages.push(msg),
                None => warn!(id = %id, "Fetched message did not parse; skipping"),
            }

            let _ = session.command(&format!("STORE {id} +FLAGS (\\Seen)"));
        }

        let _ = session.command("LOGOUT");
        Ok(messages)
    }
}

#[async_trait]
impl MailSource for ImapFetcher {
    async fn fetch_unseen(&self) -> Result<Vec<InboundMessage>, FetchError> {
        let fetcher = self.clone();
        tokio::task::spawn_blocking(move || fetcher.fetch_blocking())
            .await
            .map_err(|e| FetchError::Task(e.to_string()))?
    }
}

// ── IMAP session plumbing ───────────────────────────────────────────

/// Tagged-command IMAP session over a TLS stream.
struct ImapSession {
    stream: TlsStream,
    tag_seq: u32,
}

impl ImapSession {
    fn new(stream: TlsStream) -> Self {
        Self { stream, tag_seq: 1 }
    }

    /// Read one CRLF-terminated line.
    fn read_line(&mut self) -> Result<String, FetchError> {
        use std::io::Read;

        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => {
                    return Err(FetchError::Protocol("connection closed by server".into()));
                }
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send a tagged command and collect every response line up to and
    /// including the tagged completion line.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, FetchError> {
        use std::io::Write;

        let tag = format!("A{}", self.tag_seq);
        self.tag_seq += 1;

        let full = format!("{tag} {cmd}\r\n");
        self.stream.write_all(full.as_bytes())?;
        self.stream.flush()?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }
}

/// Did the tagged completion line report OK?
fn tagged_ok(lines: &[String]) -> bool {
    lines.last().is_some_and(|l| l.contains("OK"))
}

/// Pull message sequence numbers out of `* SEARCH` response lines.
fn parse_search_ids(lines: &[String]) -> Vec<String> {
    let mut ids = Vec::new();
    for line in lines {
        if line.starts_with("* SEARCH") {
            ids.extend(
                line.split_whitespace()
                    .skip(2)
                    .map(|s| s.to_string()),
            );
        }
    }
    ids
}

/// Reconstruct the raw message from a FETCH response: drop the untagged
/// `* n FETCH` header line, the closing paren line, and the tagged
/// completion line.
fn message_source(lines: &[String]) -> String {
    let body_lines = lines.len().saturating_sub(3);
    lines.iter().skip(1).take(body_lines).cloned().collect()
}
