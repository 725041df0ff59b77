use async_trait::async_trait;
use snapsage_core::{LlmProvider, LlmRequest, LlmResponse, ProviderError};

#[derive(Debug, Clone)]
enum Behaviour {
    Reply(Option<String>),
    RateLimited,
    Fail(String),
}

/// A mock LLM provider that returns canned responses.
pub struct MockProvider {
    name: String,
    behaviour: Behaviour,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: Behaviour::Reply(None),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.behaviour = Behaviour::Reply(Some(response.into()));
        self
    }

    /// Every call fails as if the upstream answered 429.
    pub fn rate_limited(mut self) -> Self {
        self.behaviour = Behaviour::RateLimited;
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behaviour = Behaviour::Fail(message.into());
        self
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse, ProviderError> {
        match &self.behaviour {
            Behaviour::Reply(fixed) => Ok(LlmResponse {
                content: fixed
                    .clone()
                    .unwrap_or_else(|| format!("Mock explanation of: {}", req.user_prompt)),
                provider: self.name.clone(),
                model: req.model.clone(),
                tokens_used: 0,
                latency_ms: 0,
            }),
            Behaviour::RateLimited => Err(ProviderError::RateLimited {
                provider: self.name.clone(),
                message: "You exceeded your current quota".into(),
            }),
            Behaviour::Fail(message) => Err(ProviderError::Http {
                provider: self.name.clone(),
                status: 500,
                body: message.clone(),
            }),
        }
    }
}
