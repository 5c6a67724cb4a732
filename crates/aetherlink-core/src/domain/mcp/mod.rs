//! MCP (Model Context Protocol) domain types.
//!
//! These types represent MCP servers and what they expose, independent of any
//! infrastructure concerns (storage technology, wire transport, etc.).
//!
//! # Design
//!
//! - `McpServer` - A persisted server record
//! - `McpServerType` - Transport kind (SSE, streaming HTTP, in-memory)
//! - `ConnectionKey` - Derived identity of a cacheable live connection
//! - `McpTool` / `McpPrompt` / `McpResource` - Discovered, never persisted
//! - `CallToolResult` - Uniform envelope for tool invocation outcomes
//! - `ToolCallRequest` - A tool call extracted from LLM output, with its status

mod call;
mod types;

pub use call::{
    CallToolResult, ContentKind, EmbeddedResource, ToolCallRequest, ToolCallStatus, ToolContent,
};
pub use types::{
    ConnectionKey, DEFAULT_TIMEOUT_SECS, McpPrompt, McpPromptArgument, McpResource, McpServer,
    McpServerType, McpTool,
};
