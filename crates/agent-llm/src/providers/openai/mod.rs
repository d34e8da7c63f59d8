use async_trait::async_trait;
use reqwest::Client;

use crate::provider::{LLMError, LLMProvider, LLMStream, Result};
use agent_core::{tools::ToolSchema, Message};

use super::common::openai_compat::{build_openai_compat_body, parse_openai_compat_sse_data};
use super::common::{sse::llm_stream_from_sse, status_error};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Any endpoint speaking the OpenAI chat completions streaming protocol.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn is_hosted_openai(&self) -> bool {
        self.base_url == DEFAULT_OPENAI_BASE_URL
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
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
                "OpenAI provider using override model '{}' (default: '{}')",
                model_to_use,
                self.model
            );
        }

        let body = build_openai_compat_body(model_to_use, messages, tools, max_output_tokens);

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(status_error("OpenAI", status, &text));
        }

        Ok(llm_stream_from_sse(response, |_event, data| {
            parse_openai_compat_sse_data(data)
        }))
    }

    /// Self-hosted compatible endpoints often run without a key.
    fn check_config(&self) -> Result<()> {
        if self.is_hosted_openai() && self.api_key.trim().is_empty() {
            return Err(LLMError::Auth("OpenAI API key is required".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "openai"
    }
}
