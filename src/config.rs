//! Configuration, built once from environment variables.
//!
//! Components never read the environment themselves — `Config::from_env`
//! is the single place ambient state enters the process, and everything
//! downstream receives configuration by value.

use secrecy::SecretString;

use crate::error::ConfigError;

/// In-run duplicate-suppression policy for fetched messages.
///
/// The mail server's `\Seen` flag is the only cross-run state; this policy
/// only guards against the same Message-ID appearing twice within a single
/// fetch batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Process every fetched message, duplicates included.
    None,
    /// Skip messages whose Message-ID was already processed this run.
    MessageId,
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Account address — IMAP/SMTP username and the From address.
    pub account: String,
    /// Account credential for both IMAP and SMTP.
    pub password: SecretString,
    /// Generation-API key.
    pub gemini_api_key: SecretString,
    /// Generation model name.
    pub model: String,
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub dedup: DedupPolicy,
}

impl Config {
    /// Build config from environment variables.
    ///
    /// `EMAIL_ACCOUNT`, `EMAIL_PASSWORD`, and `GEMINI_API_KEY` are
    /// required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let account = require_env("EMAIL_ACCOUNT")?;
        let password = SecretString::from(require_env("EMAIL_PASSWORD")?);
        let gemini_api_key = SecretString::from(require_env("GEMINI_API_KEY")?);

        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-1.5-flash".to_string());

        let imap_host =
            std::env::var("IMAP_HOST").unwrap_or_else(|_| "imap.gmail.com".to_string());
        let imap_port = parse_port("IMAP_PORT", 993)?;

        let smtp_host =
            std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());
        let smtp_port = parse_port("SMTP_PORT", 465)?;

        let dedup = match std::env::var("MAIL_ASSIST_DEDUP").ok().as_deref() {
            Some("0") | Some("false") | Some("off") => DedupPolicy::None,
            _ => DedupPolicy::MessageId,
        };

        Ok(Self {
            account,
            password,
            gemini_api_key,
            model,
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            dedup,
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_port(key: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a valid port"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            account: "bot@example.com".into(),
            password: SecretString::from("hunter2"),
            gemini_api_key: SecretString::from("key"),
            model: "gemini-1.5-flash".into(),
            imap_host: "imap.example.com".into(),
            imap_port: 993,
            smtp_host: "smtp.example.com".into(),
            smtp_port: 465,
            dedup: DedupPolicy::MessageId,
        }
    }

    #[test]
    fn config_is_cloneable() {
        let config = test_config();
        let cloned = config.clone();
        assert_eq!(cloned.account, "bot@example.com");
        assert_eq!(cloned.smtp_port, 465);
    }

    #[test]
    fn missing_required_var_is_reported_by_name() {
        // SAFETY: This test runs in isolation; no other thread reads
        // MAIL_ASSIST_TEST_MISSING concurrently.
        unsafe { std::env::remove_var("MAIL_ASSIST_TEST_MISSING") };
        let err = require_env("MAIL_ASSIST_TEST_MISSING").unwrap_err();
        match err {
            ConfigError::MissingEnvVar(key) => assert_eq!(key, "MAIL_ASSIST_TEST_MISSING"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn port_defaults_when_unset() {
        // SAFETY: as above — variable name is test-unique.
        unsafe { std::env::remove_var("MAIL_ASSIST_TEST_PORT") };
        assert_eq!(parse_port("MAIL_ASSIST_TEST_PORT", 993).unwrap(), 993);
    }
}
