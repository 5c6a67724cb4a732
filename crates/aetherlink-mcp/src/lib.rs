//! MCP (Model Context Protocol) client layer for AetherLink.
//!
//! Discovers, connects to and invokes tool servers over SSE, streamable
//! HTTP or in-process transports, and extracts tool calls from model output.
//!
//! # Layout
//!
//! - `registry` - persisted server records
//! - `transport` - wire transports and the per-platform factory
//! - `client` / `connection` - JSON-RPC sessions and the connection cache
//! - `catalog` / `invoker` - discovery and single calls
//! - `parser` / `orchestrator` - tool-call extraction and concurrent dispatch
//! - `format` - tool schemas and results in LLM API shapes
//! - `builtin` - the in-process servers
//! - `service` - the facade adapters hold
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod builtin;
pub mod catalog;
pub mod client;
pub mod connection;
pub mod format;
pub mod invoker;
pub mod orchestrator;
pub mod parser;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod transport;

// Dev-dependencies used only by the integration tests.
#[cfg(test)]
use axum as _;

// Re-export domain types from core for convenience
pub use aetherlink_core::{
    CallToolResult, ConnectionKey, McpPrompt, McpResource, McpServer, McpServerType, McpTool,
    ToolCallRequest, ToolCallStatus,
};

// Re-export this crate's public types
pub use catalog::{ToolCatalog, build_function_call_tool_name};
pub use client::{ClientInfo, McpClient, McpClientError};
pub use connection::ConnectionManager;
pub use format::{
    ChatMessage, MessageContent, MessagePart, mcp_system_prompt, mcp_tools_to_anthropic_tools,
    mcp_tools_to_gemini_tools, mcp_tools_to_openai_tools, tool_call_response_to_message,
};
pub use invoker::ToolInvoker;
pub use orchestrator::{Orchestrator, ToolCallCallback, ToolCallInput};
pub use parser::{has_tool_call_markup, parse_tool_use, strip_tool_call_markup};
pub use registry::{SERVERS_STORAGE_KEY, ServerRegistry};
pub use service::{BuiltinOverrides, McpService};
pub use transport::{PlatformContext, Transport, TransportError, TransportFactory, TransportProvider};
