//! Google Gemini provider implementation.

mod stream;

pub use stream::parse_gemini_sse_event;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::protocol::gemini::GeminiRequest;
use crate::protocol::ToProvider;
use crate::provider::{LLMError, LLMProvider, LLMStream, Result};
use crate::providers::common::{sse::llm_stream_from_sse, status_error};
use agent_core::{tools::ToolSchema, Message};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-lite";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }

    /// Set a custom base URL (e.g., for proxies or alternative endpoints).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    fn build_request(
        messages: &[Message],
        tools: &[ToolSchema],
        max_output_tokens: Option<u32>,
    ) -> Result<GeminiRequest> {
        let mut request: GeminiRequest = messages.to_vec().to_provider()?;

        if !tools.is_empty() {
            request.tools = Some(tools.to_vec().to_provider()?);
        }

        if let Some(max_tokens) = max_output_tokens {
            request.generation_config = Some(json!({
                "maxOutputTokens": max_tokens
            }));
        }

        Ok(request)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        max_output_tokens: Option<u32>,
        model: Option<&str>,
    ) -> Result<LLMStream> {
        // Use provided model or fall back to default
        let model_to_use = model.unwrap_or(&self.model);

        if model.is_some() {
            log::debug!(
                "Gemini provider using override model '{}' (default: '{}')",
                model_to_use,
                self.model
            );
        }

        let request = Self::build_request(messages, tools, max_output_tokens)?;

        log::debug!(
            "Gemini request: {}",
            serde_json::to_string_pretty(&request).unwrap_or_default()
        );

        let response = self
            .client
            .post(self.stream_url(model_to_use))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(LLMError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.map_err(LLMError::Http)?;
            return Err(status_error("Gemini", status, &text));
        }

        log::debug!("Gemini stream started successfully");

        Ok(llm_stream_from_sse(response, |event, data| {
            parse_gemini_sse_event(event, data)
        }))
    }

    fn check_config(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(LLMError::Auth("Gemini API key is required".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
