use std::time::Duration;

use agent_llm::{InvokerConfig, ProviderSettings};
use agent_mcp::McpServerConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MCP_SERVER_URL: &str = "http://localhost:3001/sse";

/// Everything the server needs to handle chat requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub mcp_server_url: String,
    pub provider: ProviderSettings,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub generation_timeout_secs: u64,
    pub max_steps: usize,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            mcp_server_url: DEFAULT_MCP_SERVER_URL.to_string(),
            provider: ProviderSettings::default(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 60_000,
            generation_timeout_secs: 300,
            max_steps: 1,
            max_output_tokens: None,
        }
    }
}

impl ServerConfig {
    pub fn mcp_config(&self) -> McpServerConfig {
        McpServerConfig::sse(self.mcp_server_url.clone())
            .with_connect_timeout_ms(self.connect_timeout_ms)
            .with_request_timeout_ms(self.request_timeout_ms)
    }

    pub fn invoker_config(&self) -> InvokerConfig {
        InvokerConfig {
            model: self.provider.model.clone(),
            max_output_tokens: self.max_output_tokens,
            max_steps: self.max_steps,
            generation_timeout: Duration::from_secs(self.generation_timeout_secs),
            ..InvokerConfig::default()
        }
    }
}
