use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use snapsage_core::{LlmProvider, LlmRequest, LlmResponse, ProviderError};

const PROVIDER: &str = "openai";

/// OpenAI-compatible chat completion provider.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

/// Pull `error.message` out of an OpenAI error body, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        let start = Instant::now();

        let mut messages = Vec::new();
        if !request.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: request.system_prompt.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.user_prompt.clone(),
        });

        let body = ChatRequest {
            model: request.model.clone(),
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
        };

        debug!(model = %request.model, base_url = %self.base_url, "Sending request to OpenAI");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: PROVIDER.into(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RateLimited {
                provider: PROVIDER.into(),
                message: error_message(&error_body),
            });
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                provider: PROVIDER.into(),
                status: status.as_u16(),
                body: error_message(&error_body),
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| ProviderError::Malformed {
                provider: PROVIDER.into(),
                message: e.to_string(),
            })?;

        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        let tokens_used = chat_response
            .usage
            .and_then(|u| u.total_tokens)
            .unwrap_or(0);

        Ok(LlmResponse {
            content,
            provider: PROVIDER.to_string(),
            model: request.model.clone(),
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};

    async fn upstream(status: AxumStatus, body: serde_json::Value) -> String {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let body = body.clone();
                async move { (status, Json(body)) }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn request() -> LlmRequest {
        LlmRequest {
            model: "gpt-3.5-turbo".into(),
            system_prompt: String::new(),
            user_prompt: "What is 2+2?".into(),
            max_tokens: 64,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn test_completion() {
        let base = upstream(
            AxumStatus::OK,
            serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "4"}}],
                "usage": {"total_tokens": 12}
            }),
        )
        .await;
        let provider = OpenAiProvider::new("sk-test").with_base_url(base);
        let resp = provider.complete(&request()).await.unwrap();
        assert_eq!(resp.content, "4");
        assert_eq!(resp.tokens_used, 12);
        assert_eq!(resp.provider, "openai");
    }

    #[tokio::test]
    async fn test_429_is_rate_limited() {
        let base = upstream(
            AxumStatus::TOO_MANY_REQUESTS,
            serde_json::json!({"error": {"message": "You exceeded your current quota"}}),
        )
        .await;
        let provider = OpenAiProvider::new("sk-test").with_base_url(base);
        let err = provider.complete(&request()).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("current quota"));
    }

    #[tokio::test]
    async fn test_401_is_http_error() {
        let base = upstream(
            AxumStatus::UNAUTHORIZED,
            serde_json::json!({"error": {"message": "Incorrect API key provided"}}),
        )
        .await;
        let provider = OpenAiProvider::new("bad").with_base_url(base);
        match provider.complete(&request()).await.unwrap_err() {
            ProviderError::Http { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
