//! Vision-model OCR: transcribe a frame with an OpenAI-compatible chat model.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use snapsage_core::{EngineOutput, EngineProgress, FrameBuffer, OcrEngine, RecognitionError};
use tracing::info;

use crate::png::encode_png;
use crate::recognizer::RECOGNIZING_TEXT;

const TRANSCRIBE_PROMPT: &str = "Transcribe all printed text visible in this image exactly as written, \
preserving line breaks. Reply with the text only. If there is no legible text, reply with nothing.";

pub struct VisionOcrEngine {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl VisionOcrEngine {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn language_hint(language: &str) -> &'static str {
        match language {
            "eng" => "The text is in English.",
            _ => "",
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcrEngine {
    fn name(&self) -> &str {
        "vision"
    }

    async fn recognize(
        &self,
        frame: &FrameBuffer,
        language: &str,
        on_progress: &(dyn Fn(EngineProgress) + Send + Sync),
    ) -> Result<EngineOutput, RecognitionError> {
        on_progress(EngineProgress::new("encoding image", 0.0));
        let b64 = STANDARD.encode(encode_png(frame)?);

        on_progress(EngineProgress::new(RECOGNIZING_TEXT, 0.0));
        info!(model = %self.model, "Transcribing frame via vision model");

        let prompt = format!("{TRANSCRIBE_PROMPT} {}", Self::language_hint(language));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt.trim_end() },
                    { "type": "image_url",
                      "image_url": { "url": format!("data:image/png;base64,{b64}") } }
                ]
            }],
            "max_tokens": 1024,
            "temperature": 0.0
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RecognitionError::Engine(format!("vision request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RecognitionError::Engine(format!(
                "vision model returned HTTP {}: {}",
                status.as_u16(),
                text.chars().take(200).collect::<String>()
            )));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RecognitionError::Engine(format!("unreadable vision response: {e}")))?;
        let Some(text) = json["choices"][0]["message"]["content"].as_str() else {
            return Err(RecognitionError::Engine(
                "vision response carried no message content".into(),
            ));
        };
        let text = text.to_string();

        on_progress(EngineProgress::new(RECOGNIZING_TEXT, 1.0));
        // Chat models report no per-word confidence.
        Ok(EngineOutput {
            text,
            confidence: 0.0,
        })
    }
}
