//! Domain types for the MCP client layer.

pub mod mcp;

pub use mcp::{
    CallToolResult, ConnectionKey, ContentKind, EmbeddedResource, McpPrompt, McpPromptArgument,
    McpResource, McpServer, McpServerType, McpTool, ToolCallRequest, ToolCallStatus, ToolContent,
};
