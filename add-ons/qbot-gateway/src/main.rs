//! qbot gateway: entry point. Bridges Telegram to the knowledge table and the generator.
//!
//! Startup order matters: secrets and settings are validated before any client,
//! listener, or poll loop exists, so a misconfigured process exits without touching
//! the network.

mod handlers;
mod telegram;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use qbot_core::{
    AnswerResolver, CoreConfig, IncomingMessage, KnowledgeStore, MessageContext, ReplySink, ReplyStyle,
    Secrets, SinkError,
};
use qbot_skills::ModelRouter;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telegram::{Poller, TelegramClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    config: Arc<CoreConfig>,
    resolver: Arc<AnswerResolver>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

/// Collects replies so the HTTP gateway can return them in one body.
#[derive(Default)]
struct CollectingSink {
    replies: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl ReplySink for CollectingSink {
    async fn send(&self, text: &str) -> Result<(), SinkError> {
        self.replies
            .lock()
            .map_err(|_| "reply buffer poisoned")?
            .push(text.to_string());
        Ok(())
    }
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let knowledge = state.resolver.knowledge();
    Json(serde_json::json!({
        "app_name": state.config.app_name,
        "llm_mode": state.config.llm_mode,
        "generator": state.resolver.generator_name(),
        "knowledge_source": knowledge.name(),
        "knowledge_entries": knowledge.len(),
    }))
}

async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let ctx = MessageContext::new(None);
    let sink = CollectingSink::default();
    let result = state
        .resolver
        .handle(&ctx, &IncomingMessage::new(req.message), &sink)
        .await;
    let replies = sink.replies.into_inner().unwrap_or_default();
    match result {
        Ok(source) => Json(serde_json::json!({
            "source": source,
            "replies": replies,
            "correlation_id": ctx.correlation_id,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string(), "replies": replies })),
        )
            .into_response(),
    }
}

fn gateway_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/status", get(status))
        .route("/v1/chat", post(chat))
        .with_state(state)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(config: CoreConfig, secrets: Secrets) -> anyhow::Result<()> {
    let generator = Arc::new(ModelRouter::from_config(&config, &secrets)?);
    let knowledge = Arc::new(KnowledgeStore::load(&config.knowledge_path));
    let resolver = Arc::new(AnswerResolver::with_style(
        knowledge,
        generator,
        ReplyStyle::from_config(&config),
    ));
    let config = Arc::new(config);

    tracing::info!(
        app = %config.app_name,
        llm_mode = %config.llm_mode,
        knowledge_entries = resolver.knowledge().len(),
        "qbot gateway starting"
    );

    if config.gateway_enabled {
        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = gateway_router(AppState {
            config: Arc::clone(&config),
            resolver: Arc::clone(&resolver),
        });
        tracing::info!(%addr, "local HTTP gateway listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "local HTTP gateway stopped");
            }
        });
    }

    let client = Arc::new(TelegramClient::new(
        &config.telegram_api_base,
        &secrets.bot_token,
        Duration::from_secs(config.poll_timeout_secs),
    ));
    let poller = Poller::new(client, resolver, Duration::from_secs(config.poll_retry_secs));

    tracing::info!("✅ bot is polling for messages");
    tokio::select! {
        _ = poller.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutdown requested");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("[qbot-gateway] .env not loaded: {} (using system environment)", e);
        }
    }

    init_tracing();

    let secrets = match Secrets::from_env() {
        Ok(secrets) => secrets,
        Err(e) => {
            eprintln!("❌ {}. Set BOT_TOKEN and GEMINI_API_KEY before starting.", e);
            std::process::exit(1);
        }
    };

    let config = match CoreConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config, secrets).await {
        tracing::error!(error = %e, "qbot gateway failed");
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}
