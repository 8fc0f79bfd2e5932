//! Mail Assist — mailbox auto-reply pipeline.
//!
//! Polls an IMAP inbox for unread messages, generates a reply for each via
//! the Gemini API, and emails it back to the sender as an HTML message.

pub mod config;
pub mod error;
pub mod llm;
pub mod mail;
pub mod pipeline;
