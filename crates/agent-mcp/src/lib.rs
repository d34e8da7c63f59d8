//! MCP (Model Context Protocol) client for the chat bridge.
//!
//! Opens one short-lived SSE session per chat request, discovers the tools the
//! server exposes and forwards tool calls made during generation.

pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod tool_set;
pub mod transports;
pub mod types;

pub use config::*;
pub use connection::{McpConnection, SseConnector, ToolProviderConnection, ToolProviderConnector};
pub use error::{McpError, Result};
pub use protocol::*;
pub use tool_set::ToolSet;
pub use transports::*;
pub use types::*;
