//! Telegram Bot API adapter: long-polling `getUpdates` for inbound text and `sendMessage` for replies.

use crate::handlers::chat::{spawn_reply, InboundText};
use qbot_core::{AnswerResolver, ReplySink, SinkError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Extra slack on top of the long-poll timeout before the HTTP client gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("transport error: {0}")]
    Http(reqwest::Error),
    #[error("Bot API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for TelegramError {
    // Bot API URLs embed the token.
    fn from(e: reqwest::Error) -> Self {
        TelegramError::Http(e.without_url())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Plain text messages only; bot commands (`/start`, ...) and other update kinds are dropped.
    pub fn into_text(self) -> Option<InboundText> {
        let message = self.message?;
        let text = message.text?;
        if text.starts_with('/') {
            return None;
        }
        Some(InboundText {
            chat_id: message.chat.id,
            text,
        })
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

/// Thin Bot API client bound to one bot token.
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(api_base: &str, bot_token: &str, poll_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
            poll_timeout,
        }
    }

    /// Long-polls for updates with `update_id >= offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let response = self
            .client
            .get(format!("{}/getUpdates", self.base_url))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout.as_secs().to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .timeout(self.poll_timeout + POLL_GRACE)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;
        decode::<serde_json::Value>(response).await.map(|_| ())
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TelegramError> {
    let envelope: ApiResponse<T> = response.json().await?;
    if !envelope.ok {
        return Err(TelegramError::Api(
            envelope.description.unwrap_or_else(|| "request rejected".to_string()),
        ));
    }
    envelope
        .result
        .ok_or_else(|| TelegramError::Api("response has no result".to_string()))
}

/// Replies into one Telegram chat.
pub struct ChatReplier {
    client: Arc<TelegramClient>,
    chat_id: i64,
}

impl ChatReplier {
    pub fn new(client: Arc<TelegramClient>, chat_id: i64) -> Self {
        Self { client, chat_id }
    }
}

#[async_trait::async_trait]
impl ReplySink for ChatReplier {
    async fn send(&self, text: &str) -> Result<(), SinkError> {
        self.client.send_message(self.chat_id, text).await?;
        Ok(())
    }
}

/// Long-polling dispatch loop. Each text message is handled on its own task.
pub struct Poller {
    client: Arc<TelegramClient>,
    resolver: Arc<AnswerResolver>,
    retry_delay: Duration,
}

impl Poller {
    pub fn new(client: Arc<TelegramClient>, resolver: Arc<AnswerResolver>, retry_delay: Duration) -> Self {
        Self {
            client,
            resolver,
            retry_delay,
        }
    }

    /// Polls forever. Failed polls are logged and retried after `retry_delay`.
    pub async fn run(&self) {
        let mut offset = 0;
        loop {
            match self.poll_once(offset).await {
                Ok((next, _tasks)) => offset = next,
                Err(e) => {
                    tracing::warn!(error = %e, retry_in = ?self.retry_delay, "getUpdates failed");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// One `getUpdates` round. Returns the next offset and the spawned message tasks.
    pub async fn poll_once(&self, offset: i64) -> Result<(i64, Vec<JoinHandle<()>>), TelegramError> {
        let updates = self.client.get_updates(offset).await?;
        let mut next = offset;
        let mut tasks = Vec::new();
        for update in updates {
            next = next.max(update.update_id + 1);
            let update_id = update.update_id;
            match update.into_text() {
                Some(inbound) => tasks.push(spawn_reply(
                    Arc::clone(&self.resolver),
                    Arc::clone(&self.client),
                    inbound,
                )),
                None => tracing::debug!(update_id, "skipping update without plain text"),
            }
        }
        Ok((next, tasks))
    }
}
