use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use snapsage_config::defaults::{
    DEFAULT_RELAY_MAX_TOKENS, DEFAULT_RELAY_MODEL, DEFAULT_RELAY_TEMPERATURE,
};
use snapsage_config::RelayConfig;
use snapsage_core::{LlmProvider, LlmRequest, ProviderError};
use snapsage_logging::redact_sensitive_data;

use crate::providers::build_provider;

/// Shared state for the relay handlers.
#[derive(Clone)]
pub struct RelayState {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
}

impl RelayState {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: DEFAULT_RELAY_MODEL.to_string(),
            system_prompt: String::new(),
            max_tokens: DEFAULT_RELAY_MAX_TOKENS,
            temperature: DEFAULT_RELAY_TEMPERATURE,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let provider = build_provider(config)?;
        let mut state = Self::new(provider);
        if let Some(model) = &config.model {
            state.model = model.clone();
        }
        if let Some(prompt) = &config.system_prompt {
            state.system_prompt = prompt.clone();
        }
        if let Some(max_tokens) = config.max_tokens {
            state.max_tokens = max_tokens;
        }
        if let Some(temperature) = config.temperature {
            state.temperature = temperature;
        }
        Ok(state)
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    text: Option<String>,
}

pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<RelayState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "provider": state.provider_name(),
        "model": state.model,
    }))
}

/// `POST /chat` with `{"text": ...}`.
async fn chat(
    State(state): State<RelayState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let text = match body {
        Ok(Json(ChatBody { text: Some(text) })) if !text.trim().is_empty() => text,
        Ok(_) => return missing_text(),
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected unreadable chat body");
            return missing_text();
        }
    };

    let request = LlmRequest {
        model: state.model.clone(),
        system_prompt: state.system_prompt.clone(),
        user_prompt: text,
        max_tokens: state.max_tokens,
        temperature: state.temperature,
    };

    match state.provider.complete(&request).await {
        Ok(response) => {
            info!(
                provider = %response.provider,
                model = %response.model,
                text_len = request.user_prompt.len(),
                tokens = response.tokens_used,
                latency_ms = response.latency_ms,
                "Chat completed"
            );
            (StatusCode::OK, Json(json!({ "reply": response.content })))
        }
        Err(ProviderError::RateLimited { provider, message }) => {
            let message = redact_sensitive_data(&message);
            warn!(provider = %provider, error = %message, "Upstream rate limit");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": format!("rate limit exceeded: {message}") })),
            )
        }
        Err(e) => {
            let message = redact_sensitive_data(&e.to_string());
            error!(error = %message, "Chat failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
        }
    }
}

fn missing_text() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "missing text" })),
    )
}

/// Bind `addr` (`host:port`) and serve until the process is stopped.
pub async fn serve(state: RelayState, addr: &str) -> Result<()> {
    let provider = state.provider_name().to_string();
    let model = state.model.clone();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind relay on {addr}"))?;
    info!(addr = %addr, provider = %provider, model = %model, "Relay listening");
    axum::serve(listener, relay_router(state))
        .await
        .context("Relay server failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;
    use snapsage_core::{DispatchOutcome, Dispatcher};
    use snapsage_dispatch::HttpDispatchClient;
    use std::net::SocketAddr;

    async fn spawn(state: RelayState) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, relay_router(state)).await.unwrap();
        });
        addr
    }

    async fn post_chat(addr: SocketAddr, body: Value) -> (u16, Value) {
        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/chat"))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_chat_reply() {
        let state = RelayState::new(Arc::new(
            MockProvider::new("mock").with_response("It is a stop sign."),
        ));
        let addr = spawn(state).await;
        let (status, body) = post_chat(addr, json!({"text": "STOP"})).await;
        assert_eq!(status, 200);
        assert_eq!(body["reply"], "It is a stop sign.");
    }

    #[tokio::test]
    async fn test_missing_text() {
        let addr = spawn(RelayState::new(Arc::new(MockProvider::new("mock")))).await;
        for body in [json!({}), json!({"text": "   "}), json!({"text": null})] {
            let (status, reply) = post_chat(addr, body).await;
            assert_eq!(status, 400);
            assert_eq!(reply["error"], "missing text");
        }
    }

    #[tokio::test]
    async fn test_unreadable_body_is_missing_text() {
        let addr = spawn(RelayState::new(Arc::new(MockProvider::new("mock")))).await;
        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/chat"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_rate_limited_is_429() {
        let addr = spawn(RelayState::new(Arc::new(MockProvider::new("mock").rate_limited()))).await;
        let (status, body) = post_chat(addr, json!({"text": "hello"})).await;
        assert_eq!(status, 429);
        assert!(body["error"].as_str().unwrap().starts_with("rate limit exceeded"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_500_and_redacted() {
        let state = RelayState::new(Arc::new(
            MockProvider::new("mock").failing("bad key sk-abcdefghijklmnopqrstuvwx"),
        ));
        let addr = spawn(state).await;
        let (status, body) = post_chat(addr, json!({"text": "hello"})).await;
        assert_eq!(status, 500);
        let error = body["error"].as_str().unwrap();
        assert!(!error.contains("sk-abcdefghijklmnopqrstuvwx"));
    }

    #[tokio::test]
    async fn test_health() {
        let state = RelayState::new(Arc::new(MockProvider::new("mock"))).with_model("tiny");
        let addr = spawn(state).await;
        let body: Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"status": "ok", "provider": "mock", "model": "tiny"}));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = RelayConfig {
            provider: Some(snapsage_config::RelayProviderKind::Mock),
            model: Some("m".into()),
            system_prompt: Some("Explain briefly.".into()),
            max_tokens: Some(16),
            temperature: Some(0.1),
            ..Default::default()
        };
        let state = RelayState::from_config(&config).unwrap();
        assert_eq!(state.provider_name(), "mock");
        assert_eq!(state.model(), "m");
        assert_eq!(state.system_prompt, "Explain briefly.");
        assert_eq!(state.max_tokens, 16);
    }

    #[tokio::test]
    async fn test_dispatch_client_against_relay() {
        let addr = spawn(RelayState::new(Arc::new(
            MockProvider::new("mock").with_response("An apple."),
        )))
        .await;
        let client = HttpDispatchClient::new(format!("http://{addr}/chat"));
        assert_eq!(
            client.dispatch("APPLE").await,
            DispatchOutcome::Answer("An apple.".into())
        );

        let addr = spawn(RelayState::new(Arc::new(MockProvider::new("mock").rate_limited()))).await;
        let client = HttpDispatchClient::new(format!("http://{addr}/chat"));
        assert_eq!(client.dispatch("APPLE").await, DispatchOutcome::QuotaExceeded);
    }
}
