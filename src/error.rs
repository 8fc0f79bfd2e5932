//! Error types for Mail Assist.

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Send error: {0}")]
    Send(#[from] SendError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mailbox fetch errors — connection, auth, search, or fetch failures.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("IMAP login failed for {account}")]
    AuthFailed { account: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("Fetch task failed: {0}")]
    Task(String),
}

/// Generation-API errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Generation request failed with status {status}")]
    RequestFailed { status: u16, body: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response from generation API: {0}")]
    InvalidResponse(String),
}

/// Outbound mail delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message for {recipient}: {reason}")]
    BuildFailed { recipient: String, reason: String },

    #[error("SMTP relay error: {0}")]
    Relay(String),

    #[error("SMTP send to {recipient} failed: {reason}")]
    SendFailed { recipient: String, reason: String },
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
