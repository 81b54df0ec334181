//! Answer resolution: local knowledge first, remote generation as the fallback.

mod answer;

pub use answer::AnswerResolver;

use serde::{Deserialize, Serialize};

/// Prepended to canned answers unless configured otherwise.
pub const DEFAULT_ANSWER_PREFIX: &str = "🤖 ";
/// Sent before a generation call unless configured otherwise.
pub const DEFAULT_THINKING_MESSAGE: &str = "🧠 Thinking...";

/// Error type at the reply-sink seam; platform adapters bring their own errors.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of one generation call. Failures are plain text meant for the end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationResult {
    Success(String),
    Failure(String),
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success(_))
    }

    /// The text to relay, whichever variant this is.
    pub fn text(&self) -> &str {
        match self {
            GenerationResult::Success(text) | GenerationResult::Failure(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            GenerationResult::Success(text) | GenerationResult::Failure(text) => text,
        }
    }
}

/// Decision for a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A trigger matched; reply with this canned answer.
    Immediate(String),
    /// No trigger matched; ask the remote generator.
    Delegate,
}

/// Where the final reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Knowledge,
    Generator,
}

/// Trait implemented by remote text generators.
///
/// `generate` has no error channel: every transport or protocol failure must come back
/// as [`GenerationResult::Failure`] so nothing escapes into the dispatch loop.
#[async_trait::async_trait]
pub trait RemoteGenerator: Send + Sync {
    /// Generator name for logs and status.
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> GenerationResult;
}

/// Outbound half of a conversation: whatever the platform uses to send a text reply.
#[async_trait::async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), SinkError>;
}

/// Fixed reply texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyStyle {
    pub answer_prefix: String,
    pub thinking_message: String,
}

impl ReplyStyle {
    pub fn from_config(config: &crate::CoreConfig) -> Self {
        Self {
            answer_prefix: config.answer_prefix.clone(),
            thinking_message: config.thinking_message.clone(),
        }
    }
}

impl Default for ReplyStyle {
    fn default() -> Self {
        Self {
            answer_prefix: DEFAULT_ANSWER_PREFIX.to_string(),
            thinking_message: DEFAULT_THINKING_MESSAGE.to_string(),
        }
    }
}
