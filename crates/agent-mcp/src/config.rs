use serde::{Deserialize, Serialize};

/// Tool-provider (MCP server) configuration for one chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Identifier used in log lines
    #[serde(default = "default_server_id")]
    pub id: String,
    /// SSE transport settings
    pub transport: SseConfig,
    /// Timeout for each JSON-RPC request (discovery, tool calls) in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// List of allowed tools (empty = all allowed)
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// List of denied tools
    #[serde(default)]
    pub denied_tools: Vec<String>,
}

impl McpServerConfig {
    pub fn sse(url: impl Into<String>) -> Self {
        Self {
            id: default_server_id(),
            transport: SseConfig {
                url: url.into(),
                headers: Vec::new(),
                connect_timeout_ms: default_connect_timeout(),
            },
            request_timeout_ms: default_request_timeout(),
            allowed_tools: Vec::new(),
            denied_tools: Vec::new(),
        }
    }

    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.transport.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Whether a tool survives the allow/deny lists.
    pub fn is_tool_allowed(&self, name: &str) -> bool {
        if self.denied_tools.iter().any(|denied| denied == name) {
            return false;
        }
        self.allowed_tools.is_empty() || self.allowed_tools.iter().any(|allowed| allowed == name)
    }
}

fn default_server_id() -> String {
    "default".to_string()
}

fn default_request_timeout() -> u64 {
    60000 // 60 seconds
}

/// SSE transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseConfig {
    /// SSE endpoint URL
    pub url: String,
    /// Additional headers
    #[serde(default)]
    pub headers: Vec<HeaderConfig>,
    /// Bound on the whole open handshake, in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout() -> u64 {
    10000 // 10 seconds
}

/// HTTP header configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderConfig {
    pub name: String,
    pub value: String,
}
