pub mod agent;
pub mod tools;

pub use agent::types::{ChatRequest, Message, Role};
pub use tools::{
    finalize_tool_calls, ToolCall, ToolCallAccumulator, ToolError, ToolExecutor, ToolResult,
    ToolSchema,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
