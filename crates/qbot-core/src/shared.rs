//! Shared types used across all qbot crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Environment variable holding the messaging-platform access token.
pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
/// Environment variable holding the generation API credential.
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

const ENV_CONFIG_PATH: &str = "QBOT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/qbot";

/// Fatal startup problems. Anything in here stops the process before it touches the network.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingSecrets(Vec<&'static str>),
    #[error("unknown llm_mode `{0}` (expected `live` or `mock`)")]
    UnknownLlmMode(String),
    #[error("invalid settings: {0}")]
    Settings(#[from] config::ConfigError),
}

/// The raw text a user sent. Nothing else about the sender is modeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub text: String,
}

impl IncomingMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Per-message context carried by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContext {
    /// Platform chat the replies go to. None for the local HTTP gateway.
    pub chat_id: Option<i64>,
    /// Correlation id for request tracing; never shown to the user.
    pub correlation_id: String,
}

impl MessageContext {
    pub fn new(chat_id: Option<i64>) -> Self {
        Self {
            chat_id,
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// The two credentials the process refuses to start without.
#[derive(Clone)]
pub struct Secrets {
    pub bot_token: String,
    pub gemini_api_key: String,
}

impl Secrets {
    /// Reads both secrets from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads both secrets through `lookup`. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let bot_token = read(ENV_BOT_TOKEN);
        let gemini_api_key = read(ENV_GEMINI_API_KEY);
        match (bot_token, gemini_api_key) {
            (Some(bot_token), Some(gemini_api_key)) => Ok(Self {
                bot_token,
                gemini_api_key,
            }),
            (bot_token, gemini_api_key) => {
                let mut missing = Vec::new();
                if bot_token.is_none() {
                    missing.push(ENV_BOT_TOKEN);
                }
                if gemini_api_key.is_none() {
                    missing.push(ENV_GEMINI_API_KEY);
                }
                Err(ConfigError::MissingSecrets(missing))
            }
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("bot_token", &"<redacted>")
            .field("gemini_api_key", &"<redacted>")
            .finish()
    }
}

/// Global application configuration (everything except secrets). Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity shown by the status endpoint and startup log.
    pub app_name: String,
    /// HTTP port for the local gateway.
    pub port: u16,
    /// If true, `qbot-gateway` also serves the local HTTP API.
    #[serde(default)]
    pub gateway_enabled: bool,
    /// JSON file mapping trigger phrases to canned answers.
    pub knowledge_path: String,
    /// Generator mode: "live" or "mock".
    pub llm_mode: String,
    /// Generation endpoint (POST).
    pub generation_endpoint: String,
    /// Upper bound on one generation call, in seconds.
    pub request_timeout_secs: u64,
    /// Telegram Bot API base URL, without the `/bot<token>` suffix.
    pub telegram_api_base: String,
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    pub poll_timeout_secs: u64,
    /// Pause after a failed poll before trying again, in seconds.
    pub poll_retry_secs: u64,
    /// Prepended to canned answers.
    pub answer_prefix: String,
    /// Acknowledgment sent before a generation call.
    pub thinking_message: String,
}

impl CoreConfig {
    /// Load config from file and environment. Precedence: env `QBOT__*` > file at `QBOT_CONFIG` (or `config/qbot.toml`) > defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Same as [`CoreConfig::load`] with an explicit settings file. A missing file is skipped.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .set_default("app_name", "qbot")?
            .set_default("port", 8001_i64)?
            .set_default("gateway_enabled", false)?
            .set_default("knowledge_path", "data.json")?
            .set_default("llm_mode", "live")?
            .set_default(
                "generation_endpoint",
                "https://generativelanguage.googleapis.com/v1beta2/models/text-bison-001:generate",
            )?
            .set_default("request_timeout_secs", 15_i64)?
            .set_default("telegram_api_base", "https://api.telegram.org")?
            .set_default("poll_timeout_secs", 30_i64)?
            .set_default("poll_retry_secs", 3_i64)?
            .set_default("answer_prefix", crate::resolver::DEFAULT_ANSWER_PREFIX)?
            .set_default("thinking_message", crate::resolver::DEFAULT_THINKING_MESSAGE)?;

        // `config` resolves "config/qbot" to "config/qbot.toml"; an explicit extension is honored too.
        let builder = builder.add_source(config::File::with_name(&path.to_string_lossy()).required(false));

        let built = builder
            .add_source(
                config::Environment::with_prefix("QBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(built.try_deserialize()?)
    }
}
