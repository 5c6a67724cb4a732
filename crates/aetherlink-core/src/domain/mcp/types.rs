//! MCP server domain types.
//!
//! Field names serialize in camelCase so records written by the mobile and
//! web builds of the client stay readable by every adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Default per-call timeout for a server, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Transport kind used to reach an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum McpServerType {
    /// Server-Sent Events stream plus POST endpoint
    Sse,
    /// Streaming HTTP (one POST per message, JSON or event-stream response)
    StreamableHttp,
    /// Built-in server running in-process over a linked channel pair
    InMemory,
    /// Locally spawned process. Recognised in imported configs, but this
    /// client has no process transport.
    Stdio,
}

impl McpServerType {
    /// Wire/storage name of the type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::StreamableHttp => "streamableHttp",
            Self::InMemory => "inMemory",
            Self::Stdio => "stdio",
        }
    }

    /// Whether the type reaches its server over the network.
    pub const fn is_network(self) -> bool {
        matches!(self, Self::Sse | Self::StreamableHttp)
    }
}

impl fmt::Display for McpServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted MCP server record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServer {
    /// Stable identifier.
    pub id: String,

    /// Display name; also feeds the connection key and safe tool ids.
    pub name: String,

    /// Transport kind.
    #[serde(rename = "type")]
    pub server_type: McpServerType,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Endpoint URL. Required for network transports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Extra HTTP headers sent on every request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Environment for in-memory servers (API keys, file paths).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Ordered arguments for in-memory servers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Per-call timeout in seconds.
    #[serde(rename = "timeout", alias = "timeoutSeconds", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether the server participates in tool discovery.
    #[serde(default)]
    pub is_active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl McpServer {
    fn base(id: String, name: String, server_type: McpServerType) -> Self {
        Self {
            id,
            name,
            server_type,
            description: None,
            base_url: None,
            headers: HashMap::new(),
            env: HashMap::new(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            is_active: false,
            provider: None,
            logo_url: None,
            tags: Vec::new(),
        }
    }

    /// Create an SSE server record.
    #[must_use]
    pub fn new_sse(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut server = Self::base(id.into(), name.into(), McpServerType::Sse);
        server.base_url = Some(base_url.into());
        server
    }

    /// Create a streaming-HTTP server record.
    #[must_use]
    pub fn new_streamable_http(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut server = Self::base(id.into(), name.into(), McpServerType::StreamableHttp);
        server.base_url = Some(base_url.into());
        server
    }

    /// Create an in-memory (built-in) server record.
    #[must_use]
    pub fn new_in_memory(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::base(id.into(), name.into(), McpServerType::InMemory)
    }

    /// Add a request header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Replace the argument list.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the active flag.
    #[must_use]
    pub const fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Non-empty base URL, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref().filter(|url| !url.trim().is_empty())
    }

    /// Key identifying this server's cacheable connection.
    pub fn connection_key(&self) -> ConnectionKey {
        ConnectionKey::for_server(self)
    }

    /// Check required fields.
    ///
    /// Reachability is not checked here; that happens on connect.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("MCP server id cannot be empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("MCP server name cannot be empty".to_string());
        }
        if self.server_type.is_network() && self.base_url().is_none() {
            return Err(format!(
                "{} server '{}' requires a baseUrl",
                self.server_type, self.name
            ));
        }
        Ok(())
    }
}

/// Identity of a cacheable live connection: `name-type-(baseUrl|local)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    /// Derive the key for a server record.
    pub fn for_server(server: &McpServer) -> Self {
        Self(format!(
            "{}-{}-{}",
            server.name,
            server.server_type,
            server.base_url().unwrap_or("local")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tool exposed by a connected server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    /// Function-calling safe identifier derived from server and tool names.
    pub id: String,

    /// Server-local tool name.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the arguments.
    #[serde(default = "empty_object_schema")]
    pub input_schema: Value,

    pub server_id: String,

    pub server_name: String,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl McpTool {
    /// Create a tool with an empty object schema.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        server_id: impl Into<String>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            input_schema: empty_object_schema(),
            server_id: server_id.into(),
            server_name: server_name.into(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Argument accepted by a prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpPromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A prompt template exposed by a connected server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpPrompt {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<McpPromptArgument>,
    pub server_id: String,
    pub server_name: String,
}

/// A resource exposed by a connected server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpResource {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub server_id: String,
    pub server_name: String,
}
