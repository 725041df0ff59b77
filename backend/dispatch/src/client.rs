use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use snapsage_core::{DispatchOutcome, Dispatcher};
use tracing::{debug, info, warn};

use crate::classify::classify;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/chat";

#[derive(Serialize)]
struct ChatBody<'a> {
    text: &'a str,
}

/// Posts recognized text to the reasoning endpoint. One request per call;
/// no retries and no client-side timeout.
pub struct HttpDispatchClient {
    client: Client,
    endpoint: String,
}

impl HttpDispatchClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for HttpDispatchClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

#[async_trait]
impl Dispatcher for HttpDispatchClient {
    async fn dispatch(&self, text: &str) -> DispatchOutcome {
        if text.trim().is_empty() {
            warn!(endpoint = %self.endpoint, "Refusing to dispatch empty text");
            return DispatchOutcome::TransportError("nothing to send: text is empty".into());
        }

        let start = Instant::now();
        debug!(endpoint = %self.endpoint, chars = text.chars().count(), "Dispatching text");

        let response = match self
            .client
            .post(&self.endpoint)
            .json(&ChatBody { text })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Dispatch request failed");
                return DispatchOutcome::TransportError(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if status == 429 => {
                debug!(error = %e, "Ignoring unreadable 429 body");
                String::new()
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, status, error = %e, "Failed to read dispatch reply");
                return DispatchOutcome::TransportError(format!("failed to read reply: {e}"));
            }
        };

        let outcome = classify(status, &body);
        info!(
            endpoint = %self.endpoint,
            status,
            outcome = outcome.kind(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Dispatch completed"
        );
        outcome
    }
}
