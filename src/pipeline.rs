//! Sequential pipeline driver.
//!
//! One run: fetch every unseen message, then for each message generate a
//! reply and send it. All fetching happens before any generation; per
//! message, generation strictly precedes sending. No parallelism, no
//! batching, no backoff between sends.

use std::collections::HashSet;

use tracing::{error, info, warn};

use crate::config::DedupPolicy;
use crate::error::FetchError;
use crate::llm::{self, ReplyGenerator};
use crate::mail::{MailSource, ReplySender};

/// Summary of one pipeline run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Unseen messages returned by the fetch.
    pub fetched: usize,
    /// Replies handed to the relay successfully.
    pub replied: usize,
    /// Replies the relay rejected.
    pub failed: usize,
    /// Messages skipped by the dedup policy.
    pub skipped: usize,
}

/// Run the pipeline once.
///
/// A fetch failure is returned as `Err` so the caller can tell it apart
/// from a successful fetch of zero messages. Generation and send failures
/// never abort the batch: generation errors fall back to a fixed localized
/// reply, send errors are logged per recipient and counted.
pub async fn run_once(
    source: &dyn MailSource,
    generator: &dyn ReplyGenerator,
    sender: &dyn ReplySender,
    dedup: DedupPolicy,
) -> Result<RunReport, FetchError> {
    let messages = source.fetch_unseen().await?;
    let mut report = RunReport {
        fetched: messages.len(),
        ..Default::default()
    };

    if messages.is_empty() {
        info!("No new emails");
        return Ok(report);
    }

    let mut seen: HashSet<String> = HashSet::new();

    for msg in &messages {
        if dedup == DedupPolicy::MessageId && !seen.insert(msg.message_id.clone()) {
            info!(message_id = %msg.message_id, "Skipping duplicate message");
            report.skipped += 1;
            continue;
        }

        info!(
            sender = %msg.sender,
            subject = %msg.subject,
            preview = %preview(&msg.body),
            "New email"
        );

        let reply = match generator.generate(&msg.body).await {
            Ok(text) => text,
            Err(e) => {
                warn!(sender = %msg.sender, error = %e, "Generation failed; sending fallback reply");
                llm::fallback_text(&e).to_string()
            }
        };

        let subject = format!("Re: {}", msg.subject);
        match sender.send(&msg.sender, &subject, &reply).await {
            Ok(()) => report.replied += 1,
            Err(e) => {
                error!(recipient = %msg.sender, error = %e, "Failed to send reply");
                report.failed += 1;
            }
        }
    }

    info!(
        fetched = report.fetched,
        replied = report.replied,
        failed = report.failed,
        skipped = report.skipped,
        "Run complete"
    );
    Ok(report)
}

/// First 200 characters of the body, newlines flattened for one-line logs.
fn preview(body: &str) -> String {
    body.chars()
        .take(200)
        .collect::<String>()
        .replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::error::{LlmError, SendError};
    use crate::llm::FALLBACK_NO_CANDIDATE;
    use crate::mail::InboundMessage;

    fn msg(sender: &str, subject: &str, body: &str, id: &str) -> InboundMessage {
        InboundMessage {
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            message_id: id.into(),
            received_at: Utc::now(),
        }
    }

    struct FakeSource(Vec<InboundMessage>);

    #[async_trait]
    impl MailSource for FakeSource {
        async fn fetch_unseen(&self) -> Result<Vec<InboundMessage>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MailSource for FailingSource {
        async fn fetch_unseen(&self) -> Result<Vec<InboundMessage>, FetchError> {
            Err(FetchError::Protocol("SEARCH UNSEEN failed".into()))
        }
    }

    struct FakeGenerator {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeGenerator {
        fn replying() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl ReplyGenerator for FakeGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(LlmError::InvalidResponse("no candidate text".into()))
            } else {
                Ok(format!("reply to: {prompt}"))
            }
        }
    }

    #[derive(Default)]
    struct FakeSender {
        sent: Mutex<Vec<(String, String, String)>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl ReplySender for FakeSender {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), SendError> {
            if self.fail_for.as_deref() == Some(to) {
                return Err(SendError::SendFailed {
                    recipient: to.to_string(),
                    reason: "mailbox unavailable".into(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn empty_mailbox_makes_no_generator_or_sender_calls() {
        let generator = FakeGenerator::replying();
        let sender = FakeSender::default();

        let report = run_once(
            &FakeSource(vec![]),
            &generator,
            &sender,
            DedupPolicy::MessageId,
        )
        .await
        .unwrap();

        assert_eq!(report, RunReport::default());
        assert!(generator.prompts.lock().unwrap().is_empty());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_message_flows_end_to_end() {
        let generator = FakeGenerator::replying();
        let sender = FakeSender::default();
        let source = FakeSource(vec![msg("a@example.com", "Hi", "Hello", "m1")]);

        let report = run_once(&source, &generator, &sender, DedupPolicy::MessageId)
            .await
            .unwrap();

        assert_eq!(report.fetched, 1);
        assert_eq!(report.replied, 1);
        assert_eq!(*generator.prompts.lock().unwrap(), vec!["Hello"]);

        let sent = sender.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![(
                "a@example.com".to_string(),
                "Re: Hi".to_string(),
                "reply to: Hello".to_string(),
            )]
        );
    }

    #[tokio::test]
    async fn generation_failure_sends_the_fallback_reply() {
        let generator = FakeGenerator::failing();
        let sender = FakeSender::default();
        let source = FakeSource(vec![msg("a@example.com", "Hi", "Hello", "m1")]);

        let report = run_once(&source, &generator, &sender, DedupPolicy::MessageId)
            .await
            .unwrap();

        assert_eq!(report.replied, 1);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].2, FALLBACK_NO_CANDIDATE);
    }

    #[tokio::test]
    async fn one_recipients_failure_does_not_abort_the_batch() {
        let generator = FakeGenerator::replying();
        let sender = FakeSender {
            sent: Mutex::new(Vec::new()),
            fail_for: Some("first@example.com".into()),
        };
        let source = FakeSource(vec![
            msg("first@example.com", "One", "first body", "m1"),
            msg("second@example.com", "Two", "second body", "m2"),
        ]);

        let report = run_once(&source, &generator, &sender, DedupPolicy::MessageId)
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.replied, 1);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "second@example.com");
    }

    #[tokio::test]
    async fn dedup_policy_skips_repeated_message_ids() {
        let generator = FakeGenerator::replying();
        let sender = FakeSender::default();
        let source = FakeSource(vec![
            msg("a@example.com", "Hi", "Hello", "m1"),
            msg("a@example.com", "Hi", "Hello", "m1"),
        ]);

        let report = run_once(&source, &generator, &sender, DedupPolicy::MessageId)
            .await
            .unwrap();

        assert_eq!(report.replied, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dedup_disabled_replies_to_every_fetched_message() {
        let generator = FakeGenerator::replying();
        let sender = FakeSender::default();
        let source = FakeSource(vec![
            msg("a@example.com", "Hi", "Hello", "m1"),
            msg("a@example.com", "Hi", "Hello", "m1"),
        ]);

        let report = run_once(&source, &generator, &sender, DedupPolicy::None)
            .await
            .unwrap();

        assert_eq!(report.replied, 2);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn fetch_failure_is_distinguishable_from_empty_mailbox() {
        let generator = FakeGenerator::replying();
        let sender = FakeSender::default();

        let result = run_once(
            &FailingSource,
            &generator,
            &sender,
            DedupPolicy::MessageId,
        )
        .await;

        assert!(result.is_err());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn preview_flattens_newlines_and_truncates() {
        let body = format!("line one\nline two\n{}", "x".repeat(300));
        let p = preview(&body);
        assert!(p.starts_with("line one line two"));
        assert_eq!(p.chars().count(), 200);
    }
}
