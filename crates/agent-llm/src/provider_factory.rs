//! Provider Factory
//!
//! Creates LLM providers based on configuration.

use crate::provider::{LLMError, LLMProvider};
use crate::providers::{GeminiProvider, OpenAIProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Available provider types
pub const AVAILABLE_PROVIDERS: &[&str] = &["gemini", "openai"];

/// Which provider to talk to and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            base_url: None,
            api_key: String::new(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Create a provider from settings.
///
/// A missing API key is not rejected here; the provider's `check_config`
/// reports it when a generation is attempted.
pub fn create_provider(settings: &ProviderSettings) -> Result<Arc<dyn LLMProvider>, LLMError> {
    let provider: Arc<dyn LLMProvider> = match settings.provider.to_lowercase().as_str() {
        "gemini" | "google" => {
            let mut provider = GeminiProvider::new(&settings.api_key);
            if let Some(base_url) = non_empty(&settings.base_url) {
                provider = provider.with_base_url(base_url);
            }
            if let Some(model) = non_empty(&settings.model) {
                provider = provider.with_model(model);
            }
            Arc::new(provider)
        }

        "openai" => {
            let mut provider = OpenAIProvider::new(&settings.api_key);
            if let Some(base_url) = non_empty(&settings.base_url) {
                provider = provider.with_base_url(base_url);
            }
            if let Some(model) = non_empty(&settings.model) {
                provider = provider.with_model(model);
            }
            Arc::new(provider)
        }

        _ => {
            return Err(LLMError::Auth(format!(
                "Unknown provider: {}. Available providers: {}",
                settings.provider,
                AVAILABLE_PROVIDERS.join(", ")
            )))
        }
    };

    if let Err(e) = provider.check_config() {
        log::warn!("{} provider is not ready: {}", provider.name(), e);
    }

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str, api_key: &str) -> ProviderSettings {
        ProviderSettings {
            provider: provider.to_string(),
            api_key: api_key.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_gemini_provider() {
        let provider = create_provider(&settings("gemini", "AIza-test")).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert!(provider.check_config().is_ok());
    }

    #[test]
    fn test_create_openai_provider_with_overrides() {
        let mut s = settings("OpenAI", "sk-test");
        s.base_url = Some("http://localhost:11434/v1".to_string());
        s.model = Some("llama3.1".to_string());

        let provider = create_provider(&s).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_missing_key_is_deferred_to_check_config() {
        let provider = create_provider(&settings("gemini", "")).unwrap();
        assert!(matches!(provider.check_config(), Err(LLMError::Auth(_))));
    }

    #[test]
    fn test_create_unknown_provider() {
        match create_provider(&settings("unknown", "x")) {
            Err(LLMError::Auth(msg)) => assert!(msg.contains("Unknown provider")),
            Err(other) => panic!("Expected Auth error, got {other:?}"),
            Ok(_) => panic!("Expected Auth error"),
        }
    }

    #[test]
    fn test_settings_never_serialize_api_key() {
        let value = serde_json::to_value(settings("gemini", "secret")).unwrap();
        assert!(value.get("api_key").is_none());
    }
}
