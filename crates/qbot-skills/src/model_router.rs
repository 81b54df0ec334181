//! Model Router skill: sends a prompt to the Generative Language API (or a mock) and returns generated text.

use qbot_core::{ConfigError, CoreConfig, GenerationResult, RemoteGenerator, Secrets};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SKILL_NAME: &str = "ModelRouter";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Placeholder returned when the call succeeds but yields no candidate text.
pub const NO_ANSWER: &str = "no answer found";

/// Mode for LLM invocation: mock (returns simulated generation) or live (calls the configured endpoint).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LlmMode {
    Mock,
    #[default]
    Live,
}

impl LlmMode {
    /// Parses the `llm_mode` setting.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(LlmMode::Live),
            "mock" => Ok(LlmMode::Mock),
            _ => Err(ConfigError::UnknownLlmMode(value.to_string())),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: PromptText<'a>,
}

#[derive(Serialize)]
struct PromptText<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    output: Option<String>,
}

/// Routes a prompt to a mock LLM or the live generation endpoint.
///
/// Each call is independent: one POST, bounded by `timeout`, no retry and no caching.
pub struct ModelRouter {
    mode: LlmMode,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl ModelRouter {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            mode: LlmMode::Live,
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    pub fn from_config(config: &CoreConfig, secrets: &Secrets) -> Result<Self, ConfigError> {
        let mode = LlmMode::parse(&config.llm_mode)?;
        Ok(Self::new(
            config.generation_endpoint.clone(),
            secrets.gemini_api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
        .with_mode(mode))
    }

    pub fn with_mode(mut self, mode: LlmMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> LlmMode {
        self.mode
    }

    /// Mock LLM: returns a deterministic "generated" response based on the prompt.
    fn mock_generate(&self, prompt: &str) -> String {
        let preview = prompt
            .chars()
            .take(80)
            .chain(if prompt.chars().count() > 80 { "…" } else { "" }.chars())
            .collect::<String>();
        format!("[Generated – Mock LLM] You asked: {}", preview)
    }

    async fn live_generate(&self, prompt: &str) -> GenerationResult {
        let body = GenerateRequest {
            prompt: PromptText { text: prompt },
        };
        let response = match self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return self.transport_failure(e),
        };

        let status = response.status();
        let raw = match response.text().await {
            Ok(raw) => raw,
            Err(e) => return self.transport_failure(e),
        };

        if !status.is_success() {
            tracing::debug!(status = %status, "generation endpoint returned an error status");
            return GenerationResult::Failure(format!(
                "⚠️ error communicating with remote service: {}",
                raw
            ));
        }

        match serde_json::from_str::<GenerateResponse>(&raw) {
            Ok(parsed) => {
                let text = parsed
                    .candidates
                    .into_iter()
                    .next()
                    .and_then(|c| c.output)
                    .filter(|output| !output.trim().is_empty())
                    .unwrap_or_else(|| NO_ANSWER.to_string());
                GenerationResult::Success(text)
            }
            Err(e) => GenerationResult::Failure(format!(
                "⚠️ exception during communication: malformed response: {}",
                e
            )),
        }
    }

    fn transport_failure(&self, e: reqwest::Error) -> GenerationResult {
        let cause = if e.is_timeout() {
            format!("timed out after {:?}", self.timeout)
        } else {
            error_chain(&e.without_url())
        };
        GenerationResult::Failure(format!("⚠️ exception during communication: {}", cause))
    }
}

/// Joins an error and its sources into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

#[async_trait::async_trait]
impl RemoteGenerator for ModelRouter {
    fn name(&self) -> &str {
        SKILL_NAME
    }

    async fn generate(&self, prompt: &str) -> GenerationResult {
        match self.mode {
            LlmMode::Mock => GenerationResult::Success(self.mock_generate(prompt)),
            LlmMode::Live => self.live_generate(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    const TEST_KEY: &str = "test-secret-key";

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/generate", addr)
    }

    fn router_for(endpoint: String) -> ModelRouter {
        ModelRouter::new(endpoint, TEST_KEY, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn returns_first_candidate_output() {
        let app = Router::new().route(
            "/generate",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers[API_KEY_HEADER], TEST_KEY);
                assert_eq!(body["prompt"]["text"], "what is 2+2?");
                Json(serde_json::json!({
                    "candidates": [{ "output": "4" }, { "output": "four" }]
                }))
            }),
        );
        let router = router_for(serve(app).await);
        assert_eq!(
            router.generate("what is 2+2?").await,
            GenerationResult::Success("4".to_string())
        );
    }

    #[tokio::test]
    async fn no_candidates_is_a_placeholder_not_a_failure() {
        let app = Router::new().route("/generate", post(|| async { Json(serde_json::json!({})) }));
        let router = router_for(serve(app).await);
        assert_eq!(
            router.generate("anything").await,
            GenerationResult::Success(NO_ANSWER.to_string())
        );

        let app = Router::new().route(
            "/generate",
            post(|| async { Json(serde_json::json!({ "candidates": [{ "safetyRatings": [] }] })) }),
        );
        let router = router_for(serve(app).await);
        assert_eq!(
            router.generate("anything").await,
            GenerationResult::Success(NO_ANSWER.to_string())
        );
    }

    #[tokio::test]
    async fn error_status_carries_raw_body() {
        let app = Router::new().route(
            "/generate",
            post(|| async { (StatusCode::BAD_REQUEST, "API key not valid") }),
        );
        let router = router_for(serve(app).await);
        assert_eq!(
            router.generate("hi").await,
            GenerationResult::Failure(
                "⚠️ error communicating with remote service: API key not valid".to_string()
            )
        );
    }

    #[tokio::test]
    async fn timeout_becomes_failure() {
        let app = Router::new().route(
            "/generate",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(serde_json::json!({ "candidates": [{ "output": "too late" }] }))
            }),
        );
        let router = ModelRouter::new(serve(app).await, TEST_KEY, Duration::from_millis(200));
        let result = router.generate("slow question").await;
        assert!(!result.is_success());
        assert!(result.text().starts_with("⚠️ exception during communication:"));
        assert!(result.text().contains("timed out after 200ms"), "got: {}", result.text());
    }

    #[tokio::test]
    async fn connection_refused_becomes_failure_without_leaking_key() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = format!("http://{}/generate?key={}", addr, TEST_KEY);
        let router = router_for(endpoint);
        let result = router.generate("hi").await;
        assert!(!result.is_success());
        assert!(result.text().len() > "⚠️ exception during communication: ".len());
        assert!(!result.text().contains(TEST_KEY), "diagnostic leaked the key: {}", result.text());
    }

    #[tokio::test]
    async fn malformed_body_becomes_failure() {
        let app = Router::new().route("/generate", post(|| async { "<html>oops</html>" }));
        let router = router_for(serve(app).await);
        let result = router.generate("hi").await;
        assert!(!result.is_success());
        assert!(result.text().contains("malformed response"));
    }

    #[tokio::test]
    async fn mock_mode_never_touches_the_network() {
        let router = ModelRouter::new("http://127.0.0.1:1/unreachable", TEST_KEY, Duration::from_secs(1))
            .with_mode(LlmMode::Mock);
        let long_prompt = "x".repeat(100);
        let result = router.generate(&long_prompt).await;
        assert!(result.is_success());
        assert!(result.text().ends_with('…'));
    }

    #[test]
    fn llm_mode_parse() {
        assert_eq!(LlmMode::parse("live").unwrap(), LlmMode::Live);
        assert_eq!(LlmMode::parse(" Mock ").unwrap(), LlmMode::Mock);
        assert!(matches!(
            LlmMode::parse("openai"),
            Err(ConfigError::UnknownLlmMode(mode)) if mode == "openai"
        ));
    }
}
