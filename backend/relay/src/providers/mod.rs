pub mod mock;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use anyhow::{bail, Result};
use snapsage_config::defaults::{DEFAULT_OLLAMA_BASE_URL, DEFAULT_OPENAI_BASE_URL};
use snapsage_config::{RelayConfig, RelayProviderKind};
use snapsage_core::LlmProvider;

/// Build the provider named by `relay.provider`. Expects defaults applied.
pub fn build_provider(config: &RelayConfig) -> Result<Arc<dyn LlmProvider>> {
    let kind = config.provider.unwrap_or(RelayProviderKind::Openai);
    let provider: Arc<dyn LlmProvider> = match kind {
        RelayProviderKind::Openai => {
            let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) else {
                bail!("relay.apiKey is required for the openai provider");
            };
            let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_BASE_URL);
            Arc::new(openai::OpenAiProvider::new(api_key).with_base_url(base_url))
        }
        RelayProviderKind::Ollama => {
            let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_BASE_URL);
            Arc::new(ollama::OllamaProvider::new().with_base_url(base_url))
        }
        RelayProviderKind::Mock => Arc::new(mock::MockProvider::new("mock")),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_requires_key() {
        let config = RelayConfig {
            provider: Some(RelayProviderKind::Openai),
            ..Default::default()
        };
        let err = build_provider(&config).err().unwrap();
        assert!(err.to_string().contains("relay.apiKey"));
    }

    #[test]
    fn test_selects_provider_by_kind() {
        let config = RelayConfig {
            provider: Some(RelayProviderKind::Ollama),
            ..Default::default()
        };
        assert_eq!(build_provider(&config).unwrap().name(), "ollama");

        let config = RelayConfig {
            provider: Some(RelayProviderKind::Mock),
            ..Default::default()
        };
        assert_eq!(build_provider(&config).unwrap().name(), "mock");

        let config = RelayConfig {
            provider: Some(RelayProviderKind::Openai),
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        assert_eq!(build_provider(&config).unwrap().name(), "openai");
    }
}
