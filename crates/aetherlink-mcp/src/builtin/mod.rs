//! Built-in MCP servers that run in-process.
//!
//! The set is closed: a record of type `inMemory` selects one of these by
//! name, and any other name is rejected when the transport is built.
//!
//! # Servers
//!
//! - `@aether/memory` - knowledge graph memory, optionally persisted to JSON
//! - `@aether/sequentialthinking` - structured step-by-step reasoning log
//! - `@aether/fetch` - fetch a URL and return its body as text
//! - `@aether/filesystem` - file access confined to allowed directories

mod fetch;
mod filesystem;
mod memory;
mod thinking;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use aetherlink_core::{CallToolResult, McpServer};

use crate::protocol::{JsonRpcMessage, JsonRpcRequest, PROTOCOL_VERSION, error_codes, methods};
use crate::transport::{Transport, TransportError};

pub use fetch::FetchServer;
pub use filesystem::FileSystemServer;
pub use memory::MemoryServer;
pub use thinking::ThinkingServer;

pub const MEMORY_SERVER: &str = "@aether/memory";
pub const THINKING_SERVER: &str = "@aether/sequentialthinking";
pub const FETCH_SERVER: &str = "@aether/fetch";
pub const FILESYSTEM_SERVER: &str = "@aether/filesystem";

const BUILTIN_NAMES: [&str; 4] = [MEMORY_SERVER, THINKING_SERVER, FETCH_SERVER, FILESYSTEM_SERVER];
const PROVIDER: &str = "AetherAI";

/// Tool advertised by a built-in server in `tools/list`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// An in-process tool server.
#[async_trait]
pub trait BuiltinServer: Send + Sync {
    /// Registry name, e.g. `@aether/memory`.
    fn name(&self) -> &'static str;

    fn tools(&self) -> Vec<ToolDefinition>;

    /// Run a tool. Failures are reported in the result, never as `Err`.
    async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult;
}

/// Whether `name` selects a built-in server.
pub fn is_builtin_server(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// Instantiate the built-in server a record selects.
pub fn create_server(record: &McpServer) -> Result<Arc<dyn BuiltinServer>, TransportError> {
    tracing::debug!(server_name = %record.name, args = ?record.args, "Creating built-in MCP server");
    let server: Arc<dyn BuiltinServer> = match record.name.as_str() {
        MEMORY_SERVER => Arc::new(MemoryServer::new(
            record
                .env
                .get("MEMORY_FILE_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(Into::into),
        )),
        THINKING_SERVER => Arc::new(ThinkingServer::new()),
        FETCH_SERVER => Arc::new(FetchServer::new(reqwest::Client::new())),
        FILESYSTEM_SERVER => Arc::new(FileSystemServer::new(&record.args)),
        other => return Err(TransportError::UnknownBuiltin(other.to_string())),
    };
    Ok(server)
}

/// Default catalog records for the built-in servers. All start inactive.
pub fn builtin_servers() -> Vec<McpServer> {
    let catalog = |id: &str, name: &str, description: &str, tags: &[&str]| {
        let mut server = McpServer::new_in_memory(id, name).with_description(description);
        server.provider = Some(PROVIDER.to_string());
        server.tags = tags.iter().map(ToString::to_string).collect();
        server
    };

    vec![
        catalog(
            "builtin-memory",
            MEMORY_SERVER,
            "Persistent memory backed by a local knowledge graph, so the model can \
             remember facts about the user across conversations. Set MEMORY_FILE_PATH \
             to persist it.",
            &["memory", "knowledge graph"],
        )
        .with_env("MEMORY_FILE_PATH", "memory.json"),
        catalog(
            "builtin-thinking",
            THINKING_SERVER,
            "Dynamic, reflective problem solving through a structured sequence of thoughts.",
            &["thinking", "reasoning"],
        ),
        catalog(
            "builtin-fetch",
            FETCH_SERVER,
            "Fetch the content of a web page by URL.",
            &["fetch", "web"],
        ),
        catalog(
            "builtin-filesystem",
            FILESYSTEM_SERVER,
            "Read, write and list files inside the directories passed as args.",
            &["filesystem", "files"],
        ),
    ]
}

/// Serve MCP requests arriving on `transport` until the peer closes it.
///
/// Each request runs on its own task so a slow tool does not hold up
/// discovery calls.
pub async fn serve(server: Arc<dyn BuiltinServer>, transport: Arc<dyn Transport>) {
    while let Some(message) = transport.receive().await {
        match message {
            JsonRpcMessage::Request(request) => {
                let server = Arc::clone(&server);
                let transport = Arc::clone(&transport);
                tokio::spawn(async move {
                    let response = handle_request(server.as_ref(), request).await;
                    if let Err(e) = transport.send(response).await {
                        tracing::debug!(server_name = server.name(), error = %e, "Client went away");
                    }
                });
            }
            JsonRpcMessage::Notification(note) => {
                tracing::debug!(server_name = server.name(), method = %note.method, "Notification");
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => {}
        }
    }
    let _ = transport.close().await;
    tracing::debug!(server_name = server.name(), "Built-in MCP server stopped");
}

async fn handle_request(server: &dyn BuiltinServer, request: JsonRpcRequest) -> JsonRpcMessage {
    let id = request.id;
    match request.method.as_str() {
        methods::INITIALIZE => JsonRpcMessage::response(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": { "name": server.name(), "version": env!("CARGO_PKG_VERSION") },
            }),
        ),
        methods::PING => JsonRpcMessage::response(id, json!({})),
        methods::TOOLS_LIST => JsonRpcMessage::response(id, json!({ "tools": server.tools() })),
        methods::TOOLS_CALL => {
            let params = request.params.unwrap_or(Value::Null);
            let Some(name) = params.get("name").and_then(Value::as_str) else {
                return JsonRpcMessage::error(
                    Some(id),
                    error_codes::INVALID_PARAMS,
                    "tools/call requires a tool name",
                );
            };
            let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            let result = server.call_tool(name, arguments).await;
            match serde_json::to_value(result) {
                Ok(value) => JsonRpcMessage::response(id, value),
                Err(e) => JsonRpcMessage::error(Some(id), error_codes::INTERNAL_ERROR, e.to_string()),
            }
        }
        other => JsonRpcMessage::error(
            Some(id),
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        ),
    }
}

/// Deserialize tool arguments, reporting a readable error result on mismatch.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(
    tool: &str,
    arguments: Value,
) -> Result<T, CallToolResult> {
    serde_json::from_value(arguments)
        .map_err(|e| CallToolResult::error(format!("invalid arguments for {tool}: {e}")))
}

/// Result for a tool name the server does not know.
pub(crate) fn unknown_tool(server: &str, tool: &str) -> CallToolResult {
    CallToolResult::error(format!("unknown tool '{tool}' on {server}"))
}
