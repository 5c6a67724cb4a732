//! Tool, prompt and resource discovery.
//!
//! Discovery never fails outward: a server without a capability answers
//! "method not found" and yields an empty list, and any other failure is
//! logged and also yields an empty list.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use aetherlink_core::{McpPrompt, McpResource, McpServer, McpTool};

use crate::client::McpClientError;
use crate::connection::ConnectionManager;

/// Longest id accepted by function-calling APIs.
pub const MAX_TOOL_NAME_LEN: usize = 63;

/// How many characters of the server name prefix a tool id.
const SERVER_PREFIX_LEN: usize = 7;

static INVALID_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z0-9_-]").unwrap_or_else(|e| panic!("invalid regex: {e}"))
});

static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_-]{2,}").unwrap_or_else(|e| panic!("invalid regex: {e}")));

/// Derive the function-calling id for a server's tool.
///
/// Pure and deterministic. The result matches `^[a-zA-Z][a-zA-Z0-9_-]{0,62}$`
/// for any input.
pub fn build_function_call_tool_name(server_name: &str, tool_name: &str) -> String {
    let server = server_name.replace('-', "_");
    let tool = tool_name.replace('-', "_");

    let prefix: String = server.chars().take(SERVER_PREFIX_LEN).collect();
    let combined = if tool.contains(&prefix) {
        tool
    } else {
        format!("{prefix}-{tool}")
    };

    let mut name = INVALID_CHARS.replace_all(&combined, "_").into_owned();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name = format!("tool-{name}");
    }
    let mut name = SEPARATOR_RUNS.replace_all(&name, "_").into_owned();

    // Only ASCII remains, so byte and char lengths agree.
    if name.len() > MAX_TOOL_NAME_LEN {
        name.truncate(MAX_TOOL_NAME_LEN);
        if name.ends_with(['_', '-']) {
            name.pop();
        }
    }
    name
}

/// Discovery over live connections.
pub struct ToolCatalog {
    connections: Arc<ConnectionManager>,
}

impl ToolCatalog {
    pub const fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    pub async fn list_tools(&self, server: &McpServer) -> Vec<McpTool> {
        let result = async {
            let client = self.connections.ensure_connected(server).await?;
            client.list_tools().await
        }
        .await;

        match result {
            Ok(tools) => tools
                .into_iter()
                .map(|tool| {
                    let id = build_function_call_tool_name(&server.name, &tool.name);
                    let mut entry = McpTool::new(id, tool.name, &server.id, &server.name);
                    entry.description = tool.description;
                    if let Some(schema) = tool.input_schema {
                        entry.input_schema = schema;
                    }
                    entry
                })
                .collect(),
            Err(e) => {
                log_discovery_failure(server, "tools", &e);
                Vec::new()
            }
        }
    }

    pub async fn list_prompts(&self, server: &McpServer) -> Vec<McpPrompt> {
        let result = async {
            let client = self.connections.ensure_connected(server).await?;
            client.list_prompts().await
        }
        .await;

        match result {
            Ok(prompts) => prompts
                .into_iter()
                .map(|prompt| McpPrompt {
                    name: prompt.name,
                    description: prompt.description,
                    arguments: prompt.arguments,
                    server_id: server.id.clone(),
                    server_name: server.name.clone(),
                })
                .collect(),
            Err(e) => {
                log_discovery_failure(server, "prompts", &e);
                Vec::new()
            }
        }
    }

    pub async fn list_resources(&self, server: &McpServer) -> Vec<McpResource> {
        let result = async {
            let client = self.connections.ensure_connected(server).await?;
            client.list_resources().await
        }
        .await;

        match result {
            Ok(resources) => resources
                .into_iter()
                .map(|resource| McpResource {
                    uri: resource.uri,
                    name: resource.name,
                    description: resource.description,
                    mime_type: resource.mime_type,
                    server_id: server.id.clone(),
                    server_name: server.name.clone(),
                })
                .collect(),
            Err(e) => {
                log_discovery_failure(server, "resources", &e);
                Vec::new()
            }
        }
    }

    /// Tools across `servers`, scanned one server at a time.
    pub async fn all_tools(&self, servers: &[McpServer]) -> Vec<McpTool> {
        let mut tools = Vec::new();
        for server in servers {
            tools.extend(self.list_tools(server).await);
        }
        tools
    }
}

fn log_discovery_failure(server: &McpServer, what: &str, error: &McpClientError) {
    if error.is_method_not_found() {
        tracing::debug!(server_name = %server.name, capability = what, "Capability not offered");
    } else {
        tracing::warn!(
            server_name = %server.name,
            capability = what,
            error = %error,
            "MCP discovery failed"
        );
    }
}
