//! Canonical event union for the MCP client layer.
//!
//! # Structure
//!
//! - `mcp` - MCP server lifecycle and tool call events
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag so UI listeners can switch on it:
//!
//! ```json
//! { "type": "mcp_server_started", "serverId": "builtin-memory", "serverName": "@aether/memory" }
//! ```

mod mcp;

use serde::{Deserialize, Serialize};

use crate::domain::ToolCallStatus;
use crate::ports::McpErrorInfo;

pub use mcp::McpServerSummary;

/// Events emitted by the MCP service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    // ========== MCP Server Events ==========
    /// An MCP server was added to the registry.
    McpServerAdded {
        /// Summary of the added server.
        server: McpServerSummary,
    },

    /// An MCP server was removed from the registry.
    McpServerRemoved {
        #[serde(rename = "serverId")]
        server_id: String,
    },

    /// A live connection to an MCP server was established.
    McpServerStarted {
        #[serde(rename = "serverId")]
        server_id: String,
        #[serde(rename = "serverName")]
        server_name: String,
    },

    /// A live connection to an MCP server was closed.
    McpServerStopped {
        #[serde(rename = "serverId")]
        server_id: String,
        #[serde(rename = "serverName")]
        server_name: String,
    },

    /// An MCP server failed to connect or respond.
    McpServerError {
        /// User-safe error information.
        error: McpErrorInfo,
    },

    // ========== Tool Call Events ==========
    /// A tool call changed status.
    ToolCallUpdated {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(rename = "toolId")]
        tool_id: String,
        status: ToolCallStatus,
    },
}

impl AppEvent {
    /// Get the event name for wire protocols.
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::McpServerAdded { .. } => "mcp:added",
            Self::McpServerRemoved { .. } => "mcp:removed",
            Self::McpServerStarted { .. } => "mcp:started",
            Self::McpServerStopped { .. } => "mcp:stopped",
            Self::McpServerError { .. } => "mcp:error",
            Self::ToolCallUpdated { .. } => "mcp:tool_call",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tags() {
        let event = AppEvent::mcp_server_started("builtin-memory", "@aether/memory");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "mcp_server_started");
        assert_eq!(json["serverId"], "builtin-memory");
        assert_eq!(event.event_name(), "mcp:started");
    }

    #[test]
    fn test_tool_call_event() {
        let event = AppEvent::tool_call_updated("srv_search-1", "srv_search", ToolCallStatus::Done);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "tool_call_updated");
        assert_eq!(json["status"], "done");
    }
}
