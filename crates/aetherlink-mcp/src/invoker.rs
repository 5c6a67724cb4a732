//! Single tool invocation with failures folded into the result.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use aetherlink_core::{CallToolResult, McpServer};

use crate::connection::ConnectionManager;

pub struct ToolInvoker {
    connections: Arc<ConnectionManager>,
}

impl ToolInvoker {
    pub const fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    /// Call `tool_name` on `server` with the server's timeout.
    ///
    /// Never fails: connection, transport and protocol errors come back as
    /// an error result reading `tool call failed: <tool>: <message>`.
    pub async fn call(&self, server: &McpServer, tool_name: &str, arguments: Value) -> CallToolResult {
        let timeout = Duration::from_secs(server.timeout_secs).max(Duration::from_millis(1));

        let outcome = async {
            let client = self.connections.ensure_connected(server).await?;
            client.call_tool(tool_name, arguments, Some(timeout)).await
        }
        .await;

        match outcome {
            Ok(result) => {
                if result.is_error {
                    tracing::debug!(
                        server_name = %server.name,
                        tool = %tool_name,
                        "Tool reported an error"
                    );
                }
                result.normalized()
            }
            Err(e) => {
                tracing::warn!(
                    server_name = %server.name,
                    tool = %tool_name,
                    error = %e,
                    "Tool call failed"
                );
                CallToolResult::error(format!("tool call failed: {tool_name}: {e}"))
            }
        }
    }
}
