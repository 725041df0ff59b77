use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{DeviceError, ProviderError, RecognitionError};
use crate::types::{DeviceHint, DispatchOutcome, FrameBuffer, RawFrame};

/// Platform boundary that opens camera streams.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Backend name (e.g., "v4l2", "still").
    fn name(&self) -> &str;

    /// Open a stream honoring the given facing constraint.
    async fn open(&self, hint: DeviceHint) -> Result<Arc<dyn VideoStream>, DeviceError>;
}

/// A live feed that always exposes its most recent frame.
pub trait VideoStream: Send + Sync {
    fn is_live(&self) -> bool;

    fn current_frame(&self) -> Option<RawFrame>;
}

/// Progress as reported by an OCR engine. `progress` is a fraction in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProgress {
    pub status: String,
    pub progress: f32,
}

impl EngineProgress {
    pub fn new(status: impl Into<String>, progress: f32) -> Self {
        Self {
            status: status.into(),
            progress,
        }
    }
}

/// Raw engine result; confidence is on a 0..100 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    pub text: String,
    pub confidence: f32,
}

/// Text recognition engine.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(
        &self,
        frame: &FrameBuffer,
        language: &str,
        on_progress: &(dyn Fn(EngineProgress) + Send + Sync),
    ) -> Result<EngineOutput, RecognitionError>;
}

/// Sends recognized text to the reasoning service. Never fails; every
/// failure is folded into the outcome.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, text: &str) -> DispatchOutcome;
}

/// Trait for LLM providers used by the relay.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, ProviderError>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
