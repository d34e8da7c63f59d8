use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::config::McpServerConfig;
use crate::error::{McpError, Result};
use crate::protocol::{McpProtocolClient, McpTransport};
use crate::transports::SseTransport;
use crate::types::{ConnectionState, McpCallResult, McpTool};

/// An opened session with a tool provider.
#[async_trait]
pub trait ToolProviderConnection: Send + Sync {
    fn state(&self) -> ConnectionState;

    /// Tools the provider exposes, after the configured allow/deny filter.
    async fn list_tools(&self) -> Result<Vec<McpTool>>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpCallResult>;

    /// Release the session. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

/// Opens a fresh connection for each chat request.
#[async_trait]
pub trait ToolProviderConnector: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn ToolProviderConnection>>;
}

/// MCP session over an [`McpTransport`].
pub struct McpConnection {
    config: McpServerConfig,
    client: McpProtocolClient,
    state: Mutex<ConnectionState>,
}

impl McpConnection {
    pub fn new(config: McpServerConfig) -> Self {
        let transport = Arc::new(SseTransport::new(config.transport.clone()));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: McpServerConfig, transport: Arc<dyn McpTransport>) -> Self {
        Self {
            config,
            client: McpProtocolClient::new(transport),
            state: Mutex::new(ConnectionState::Unopened),
        }
    }

    /// Connect and run the initialize handshake within `connect_timeout_ms`.
    ///
    /// A failed open tears down whatever was started and leaves the
    /// connection `Closed`.
    pub async fn open(&self) -> Result<()> {
        {
            let state = self.state.lock();
            if *state != ConnectionState::Unopened {
                return Err(McpError::Connection(format!(
                    "Cannot open connection in state {}",
                    *state
                )));
            }
        }

        let timeout = Duration::from_millis(self.config.transport.connect_timeout_ms);
        let handshake = async {
            self.client.connect().await?;
            self.client.initialize(self.config.request_timeout_ms).await
        };

        match tokio::time::timeout(timeout, handshake).await {
            Ok(Ok(init)) => {
                info!(
                    "MCP server '{}' initialized: {} {}",
                    self.config.id, init.server_info.name, init.server_info.version
                );
                *self.state.lock() = ConnectionState::Open;
                Ok(())
            }
            Ok(Err(e)) => {
                self.abandon().await;
                Err(e)
            }
            Err(_) => {
                self.abandon().await;
                Err(McpError::Timeout(format!(
                    "Connecting to MCP server '{}' took longer than {}ms",
                    self.config.id, self.config.transport.connect_timeout_ms
                )))
            }
        }
    }

    async fn abandon(&self) {
        *self.state.lock() = ConnectionState::Closed;
        if let Err(e) = self.client.disconnect().await {
            debug!("Ignoring disconnect error after failed open: {}", e);
        }
    }

    fn ensure_open(&self) -> Result<()> {
        match *self.state.lock() {
            ConnectionState::Open => Ok(()),
            ConnectionState::Unopened => Err(McpError::NotOpen),
            ConnectionState::Closed => Err(McpError::Closed),
        }
    }
}

#[async_trait]
impl ToolProviderConnection for McpConnection {
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>> {
        self.ensure_open()?;

        let tools = self.client.list_tools(self.config.request_timeout_ms).await?;
        let total = tools.len();
        let tools: Vec<McpTool> = tools
            .into_iter()
            .filter(|tool| self.config.is_tool_allowed(&tool.name))
            .collect();

        debug!(
            "MCP server '{}' exposes {} tools ({} after filtering)",
            self.config.id,
            total,
            tools.len()
        );
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpCallResult> {
        self.ensure_open()?;

        if !self.config.is_tool_allowed(name) {
            return Err(McpError::ToolNotFound(name.to_string()));
        }

        self.client
            .call_tool(name, arguments, self.config.request_timeout_ms)
            .await
    }

    async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed {
                return Ok(());
            }
            *state = ConnectionState::Closed;
        }

        info!("Closing MCP connection '{}'", self.config.id);
        self.client.disconnect().await.map_err(|e| {
            warn!("MCP connection '{}' did not close cleanly: {}", self.config.id, e);
            e
        })
    }
}

/// Connector that opens an [`McpConnection`] over SSE.
#[derive(Debug, Clone)]
pub struct SseConnector {
    config: McpServerConfig,
}

impl SseConnector {
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }
}

#[async_trait]
impl ToolProviderConnector for SseConnector {
    async fn open(&self) -> Result<Arc<dyn ToolProviderConnection>> {
        let connection = McpConnection::new(self.config.clone());
        connection.open().await?;
        Ok(Arc::new(connection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::client::testing::ScriptedTransport;
    use crate::protocol::JsonRpcRequest;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn todo_server(req: &JsonRpcRequest) -> Option<Value> {
        match req.method.as_str() {
            "initialize" => Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "todo-server", "version": "1.0.0"}
            })),
            "tools/list" => Some(json!({
                "tools": [
                    {"name": "list_todos", "description": "List todos", "inputSchema": {"type": "object"}},
                    {"name": "delete_todo", "description": "Delete a todo"}
                ]
            })),
            "tools/call" => Some(json!({
                "content": [{"type": "text", "text": "no todos"}]
            })),
            _ => None,
        }
    }

    fn config() -> McpServerConfig {
        McpServerConfig::sse("http://localhost:3001/sse")
            .with_connect_timeout_ms(500)
            .with_request_timeout_ms(500)
    }

    #[tokio::test]
    async fn open_list_call_close() {
        let transport = Arc::new(ScriptedTransport::new(Box::new(todo_server)));
        let connection = McpConnection::with_transport(config(), transport.clone());
        assert_eq!(connection.state(), ConnectionState::Unopened);

        connection.open().await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Open);

        let tools = connection.list_tools().await.unwrap();
        assert_eq!(tools.len(), 2);

        let result = connection.call_tool("list_todos", json!({})).await.unwrap();
        assert_eq!(result.to_text(), "no todos");

        connection.close().await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new(Box::new(todo_server)));
        let connection = McpConnection::with_transport(config(), transport.clone());
        connection.open().await.unwrap();

        connection.close().await.unwrap();
        connection.close().await.unwrap();

        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn operations_require_open_connection() {
        let transport = Arc::new(ScriptedTransport::new(Box::new(todo_server)));
        let connection = McpConnection::with_transport(config(), transport);

        assert!(matches!(connection.list_tools().await, Err(McpError::NotOpen)));

        connection.open().await.unwrap();
        connection.close().await.unwrap();

        assert!(matches!(connection.list_tools().await, Err(McpError::Closed)));
        assert!(matches!(
            connection.call_tool("list_todos", json!({})).await,
            Err(McpError::Closed)
        ));
    }

    #[tokio::test]
    async fn failed_open_is_not_open() {
        let transport = Arc::new(ScriptedTransport::failing(McpError::Connection(
            "refused".to_string(),
        )));
        let connection = McpConnection::with_transport(config(), transport);

        let err = connection.open().await.unwrap_err();
        assert!(matches!(err, McpError::Connection(_)));
        assert_ne!(connection.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn silent_server_times_out_open() {
        let transport = Arc::new(ScriptedTransport::new(Box::new(|_| None)));
        let connection = McpConnection::with_transport(
            McpServerConfig::sse("http://localhost:3001/sse")
                .with_connect_timeout_ms(50)
                .with_request_timeout_ms(5000),
            transport.clone(),
        );

        let err = connection.open().await.unwrap_err();
        assert!(matches!(err, McpError::Timeout(_)));
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn filters_denied_tools() {
        let mut cfg = config();
        cfg.denied_tools = vec!["delete_todo".to_string()];
        let transport = Arc::new(ScriptedTransport::new(Box::new(todo_server)));
        let connection = McpConnection::with_transport(cfg, transport);
        connection.open().await.unwrap();

        let names: Vec<String> = connection
            .list_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["list_todos"]);
        assert!(matches!(
            connection.call_tool("delete_todo", json!({})).await,
            Err(McpError::ToolNotFound(_))
        ));
    }

    #[tokio::test]
    async fn connector_reports_unreachable_server() {
        let connector = SseConnector::new(
            McpServerConfig::sse("http://127.0.0.1:1/sse").with_connect_timeout_ms(500),
        );
        assert!(connector.open().await.is_err());
    }
}
