//! Generation-API client — one best-effort Gemini `generateContent` call
//! per message. No retries, no rate-limit handling; a failed call becomes
//! a typed error the driver maps to a fixed localized fallback reply.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::Config;
use crate::error::LlmError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reply sent when the API answers with a non-success status.
pub const FALLBACK_API_ERROR: &str = "אירעה שגיאה בעת יצירת התגובה.";
/// Reply sent when the HTTP call itself fails.
pub const FALLBACK_TRANSPORT_ERROR: &str = "שגיאה פנימית בתקשורת עם Gemini.";
/// Reply sent when a success body lacks the candidate structure.
pub const FALLBACK_NO_CANDIDATE: &str = "תשובה לא נמצאה בתכנית התגובה של Gemini.";

/// Map a generation error to the localized reply the recipient gets
/// instead of a generated answer.
pub fn fallback_text(err: &LlmError) -> &'static str {
    match err {
        LlmError::RequestFailed { .. } => FALLBACK_API_ERROR,
        LlmError::Transport(_) => FALLBACK_TRANSPORT_ERROR,
        LlmError::InvalidResponse(_) => FALLBACK_NO_CANDIDATE,
    }
}

/// Produces a reply for an extracted message body.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ReplyContent>,
}

#[derive(Debug, Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

/// First candidate's text, walking candidates → content → parts → text.
fn first_candidate_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text
}

// ── Client ──────────────────────────────────────────────────────────

/// Gemini `generateContent` client.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.gemini_api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Endpoint URL with the API key as a query parameter.
    fn endpoint(&self) -> String {
        format!(
            "{GEMINI_BASE_URL}/{}:generateContent?key={}",
            self.model,
            self.api_key.expose_secret()
        )
    }
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self.http.post(self.endpoint()).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(status = status.as_u16(), body = %body, "Generation API returned an error");
            return Err(LlmError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("body is not valid JSON: {e}")))?;

        first_candidate_text(parsed)
            .ok_or_else(|| LlmError::InvalidResponse("no candidate text in response".into()))
    }
}
