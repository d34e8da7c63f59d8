use agent_core::tools::{
    parse_tool_args, ToolCall, ToolError, ToolExecutor, ToolResult, ToolSchema,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::connection::ToolProviderConnection;
use crate::error::{McpError, Result};
use crate::types::McpTool;

/// Tools discovered on one open connection, keyed by name.
///
/// Executing a tool forwards the call over the connection it was discovered
/// on; once that connection is closed every call fails.
pub struct ToolSet {
    connection: Arc<dyn ToolProviderConnection>,
    tools: BTreeMap<String, McpTool>,
}

impl ToolSet {
    pub async fn discover(connection: Arc<dyn ToolProviderConnection>) -> Result<Self> {
        let discovered = connection.list_tools().await?;

        let mut tools = BTreeMap::new();
        for tool in discovered {
            if tools.contains_key(&tool.name) {
                warn!("Duplicate MCP tool '{}', keeping the first", tool.name);
                continue;
            }
            tools.insert(tool.name.clone(), tool);
        }

        debug!("Discovered {} MCP tools", tools.len());
        Ok(Self { connection, tools })
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }
}

#[async_trait]
impl ToolExecutor for ToolSet {
    async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let name = &call.function.name;
        if !self.tools.contains_key(name) {
            return Err(ToolError::NotFound(format!("MCP tool '{}' not found", name)));
        }

        let args = parse_tool_args(&call.function.arguments)?;
        debug!("Executing MCP tool: {}", name);

        match self.connection.call_tool(name, args).await {
            Ok(result) if result.is_error => Ok(ToolResult::failed(result.to_text())),
            Ok(result) => Ok(ToolResult::ok(result.to_text())),
            Err(McpError::ToolNotFound(tool)) => {
                Err(ToolError::NotFound(format!("MCP tool '{}' not found", tool)))
            }
            Err(e) => {
                warn!("MCP tool '{}' failed: {}", name, e);
                Err(ToolError::Execution(e.to_string()))
            }
        }
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|tool| {
                ToolSchema::function(
                    tool.name.clone(),
                    tool.description.clone(),
                    tool.parameters.clone(),
                )
            })
            .collect()
    }
}
