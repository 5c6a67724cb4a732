//! MCP server lifecycle events.

use serde::{Deserialize, Serialize};

use super::AppEvent;
use crate::domain::{McpServer, ToolCallStatus};
use crate::ports::McpErrorInfo;

/// Summary of an MCP server for event payloads.
///
/// This is a lightweight representation for events, not the full `McpServer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerSummary {
    pub id: String,
    pub name: String,
    /// Wire name of the transport type.
    pub server_type: String,
    pub is_active: bool,
}

impl From<&McpServer> for McpServerSummary {
    fn from(server: &McpServer) -> Self {
        Self {
            id: server.id.clone(),
            name: server.name.clone(),
            server_type: server.server_type.as_str().to_string(),
            is_active: server.is_active,
        }
    }
}

impl AppEvent {
    /// Create an MCP server added event.
    pub fn mcp_server_added(server: &McpServer) -> Self {
        Self::McpServerAdded {
            server: server.into(),
        }
    }

    /// Create an MCP server removed event.
    pub fn mcp_server_removed(server_id: impl Into<String>) -> Self {
        Self::McpServerRemoved {
            server_id: server_id.into(),
        }
    }

    /// Create an MCP server started event.
    pub fn mcp_server_started(server_id: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self::McpServerStarted {
            server_id: server_id.into(),
            server_name: server_name.into(),
        }
    }

    /// Create an MCP server stopped event.
    pub fn mcp_server_stopped(server_id: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self::McpServerStopped {
            server_id: server_id.into(),
            server_name: server_name.into(),
        }
    }

    /// Create an MCP server error event.
    pub const fn mcp_server_error(error: McpErrorInfo) -> Self {
        Self::McpServerError { error }
    }

    pub fn tool_call_updated(
        request_id: impl Into<String>,
        tool_id: impl Into<String>,
        status: ToolCallStatus,
    ) -> Self {
        Self::ToolCallUpdated {
            request_id: request_id.into(),
            tool_id: tool_id.into(),
            status,
        }
    }
}
