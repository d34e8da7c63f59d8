use async_trait::async_trait;
use thiserror::Error;

use crate::tools::{ToolCall, ToolResult, ToolSchema};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// Something the generation engine can hand tool calls to.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;
    fn list_tools(&self) -> Vec<ToolSchema>;
}

/// Parse the raw argument text of a tool call into a JSON object.
///
/// Models sometimes emit an empty string for tools without parameters, which
/// is treated as `{}`.
pub fn parse_tool_args(arguments: &str) -> Result<serde_json::Value> {
    let trimmed = arguments.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }

    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| ToolError::InvalidArguments(format!("Invalid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(ToolError::InvalidArguments(format!(
            "expected a JSON object, got {}",
            value
        )));
    }

    Ok(value)
}
