//! MCP JSON-RPC client over any [`Transport`].
//!
//! A reader task owns the inbound side of the transport and routes each
//! response to the request waiting on its id, so any number of requests can
//! be outstanding on one connection.
//! Reference: <https://spec.modelcontextprotocol.io/>

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use aetherlink_core::{CallToolResult, McpSettings};

use crate::protocol::{JsonRpcMessage, PROTOCOL_VERSION, RequestId, error_codes, methods};
use crate::transport::{Transport, TransportError};

/// Shared by every client so JSON-RPC ids never repeat within the process.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Upper bound on `nextCursor` pages followed by a single list call.
const MAX_LIST_PAGES: usize = 32;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{method} timed out after {timeout_ms} ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("MCP server returned error: code={code}, message={message}")]
    ServerError { code: i64, message: String },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed")]
    Closed,
}

impl McpClientError {
    /// The server does not implement the method (JSON-RPC `-32601`).
    pub const fn is_method_not_found(&self) -> bool {
        matches!(self, Self::ServerError { code, .. } if *code == error_codes::METHOD_NOT_FOUND)
    }
}

/// Name and version sent in `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl ClientInfo {
    pub fn from_settings(settings: &McpSettings) -> Self {
        Self {
            name: settings.client_name.clone(),
            version: settings.client_version.clone(),
        }
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::from_settings(&McpSettings::default())
    }
}

/// Server information from initialize.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// MCP initialize result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: Option<String>,
    pub server_info: ServerInfo,
    #[serde(default)]
    pub capabilities: Value,
}

/// Tool entry from `tools/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
}

/// Prompt entry from `prompts/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<aetherlink_core::McpPromptArgument>,
}

/// Resource entry from `resources/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

type PendingMap = Arc<StdMutex<HashMap<RequestId, oneshot::Sender<JsonRpcMessage>>>>;

/// A live, initialized MCP session.
pub struct McpClient {
    id_prefix: String,
    transport: Arc<dyn Transport>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    reader: StdMutex<Option<JoinHandle<()>>>,
    timeout: Duration,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    /// Open `transport` and run the initialize handshake.
    ///
    /// `id_prefix` tags every request id so traffic from different servers
    /// is easy to tell apart in logs. The transport is closed again if the
    /// handshake fails.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        info: &ClientInfo,
        id_prefix: &str,
        timeout: Duration,
    ) -> Result<Self, McpClientError> {
        transport.start().await?;

        let pending: PendingMap = Arc::new(StdMutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(
            Arc::clone(&transport),
            Arc::clone(&pending),
            Arc::clone(&closed),
        ));

        let mut client = Self {
            id_prefix: id_prefix.to_string(),
            transport,
            pending,
            closed,
            reader: StdMutex::new(Some(reader)),
            timeout,
            server_info: None,
        };

        match client.initialize(info).await {
            Ok(result) => {
                tracing::debug!(
                    server = %result.server_info.name,
                    version = ?result.server_info.version,
                    protocol = ?result.protocol_version,
                    "MCP session initialized"
                );
                client.server_info = Some(result.server_info);
                Ok(client)
            }
            Err(e) => {
                client.close().await;
                Err(e)
            }
        }
    }

    async fn initialize(&self, info: &ClientInfo) -> Result<InitializeResult, McpClientError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": { "name": info.name, "version": info.version },
            "capabilities": {}
        });
        let result = self.request(methods::INITIALIZE, Some(params), None).await?;
        let result: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpClientError::Protocol(format!("invalid initialize result: {e}")))?;

        self.notify(methods::INITIALIZED, None).await?;
        Ok(result)
    }

    /// Send a request and wait for its response.
    ///
    /// `timeout` falls back to the client default.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, McpClientError> {
        if self.is_closed() {
            return Err(McpClientError::Closed);
        }

        let n = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let id = RequestId::String(format!("{}-{n}", self.id_prefix));
        let (tx, rx) = oneshot::channel();
        self.pending_map().insert(id.clone(), tx);

        // One deadline covers delivery, any transport retries and the reply.
        let timeout = timeout.unwrap_or(self.timeout);
        let deadline = Instant::now() + timeout;
        let timed_out = || McpClientError::Timeout {
            method: method.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        };

        tracing::debug!(id = %id, method, "MCP request");
        let exchange = async {
            self.transport
                .send_before(JsonRpcMessage::request(id.clone(), method, params), deadline)
                .await?;
            let reply = rx.await.map_err(|_| McpClientError::Closed)?;
            Ok::<_, McpClientError>(reply)
        };
        let reply = match tokio::time::timeout_at(deadline, exchange).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                self.pending_map().remove(&id);
                return Err(match e {
                    McpClientError::Transport(TransportError::Timeout(_))
                        if Instant::now() >= deadline =>
                    {
                        timed_out()
                    }
                    other => other,
                });
            }
            Err(_) => {
                self.pending_map().remove(&id);
                return Err(timed_out());
            }
        };

        match reply {
            JsonRpcMessage::Response(response) => Ok(response.result),
            JsonRpcMessage::Error(error) => Err(McpClientError::ServerError {
                code: error.error.code,
                message: error.error.message,
            }),
            other => Err(McpClientError::Protocol(format!(
                "unexpected reply to {method}: {other:?}"
            ))),
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpClientError> {
        if self.is_closed() {
            return Err(McpClientError::Closed);
        }
        self.transport
            .send_before(
                JsonRpcMessage::notification(method, params),
                Instant::now() + self.timeout,
            )
            .await
            .map_err(Into::into)
    }

    /// Follow `nextCursor` pages of a list method and collect `key` entries.
    async fn list_all<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        key: &str,
    ) -> Result<Vec<T>, McpClientError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page = self.request(method, params, None).await?;

            let entries = page.get(key).cloned().unwrap_or_else(|| json!([]));
            let batch: Vec<T> = serde_json::from_value(entries)
                .map_err(|e| McpClientError::Protocol(format!("invalid {method} result: {e}")))?;
            items.extend(batch);

            cursor = page
                .get("nextCursor")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            if cursor.is_none() {
                return Ok(items);
            }
        }

        tracing::warn!(method, pages = MAX_LIST_PAGES, "Stopped following list pagination");
        Ok(items)
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpClientError> {
        self.list_all(methods::TOOLS_LIST, "tools").await
    }

    pub async fn list_prompts(&self) -> Result<Vec<PromptInfo>, McpClientError> {
        self.list_all(methods::PROMPTS_LIST, "prompts").await
    }

    pub async fn list_resources(&self) -> Result<Vec<ResourceInfo>, McpClientError> {
        self.list_all(methods::RESOURCES_LIST, "resources").await
    }

    /// Call a tool. A result with `isError` is returned as `Ok`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout: Option<Duration>,
    ) -> Result<CallToolResult, McpClientError> {
        let params = json!({ "name": name, "arguments": arguments });
        let result = self.request(methods::TOOLS_CALL, Some(params), timeout).await?;
        serde_json::from_value(result)
            .map_err(|e| McpClientError::Protocol(format!("invalid tools/call result: {e}")))
    }

    /// Render a prompt template. The raw `prompts/get` result is returned.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<Value, McpClientError> {
        let params = json!({ "name": name, "arguments": arguments });
        self.request(methods::PROMPTS_GET, Some(params), None).await
    }

    /// Read a resource. The raw `resources/read` result is returned.
    pub async fn read_resource(&self, uri: &str) -> Result<Value, McpClientError> {
        self.request(methods::RESOURCES_READ, Some(json!({ "uri": uri })), None)
            .await
    }

    pub async fn ping(&self) -> Result<(), McpClientError> {
        self.request(methods::PING, None, None).await.map(|_| ())
    }

    /// Get server info (available after initialize).
    pub const fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Whether the session has ended, either by `close` or because the
    /// server side of the transport went away.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the transport. Outstanding requests fail with `Closed`.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Err(e) = self.transport.close().await {
            tracing::debug!(error = %e, "Error closing MCP transport");
        }
        if let Some(reader) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            reader.abort();
        }
        self.pending_map().clear();
    }

    fn pending_map(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, oneshot::Sender<JsonRpcMessage>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        if let Some(reader) = self
            .reader
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            reader.abort();
        }
    }
}

async fn read_loop(transport: Arc<dyn Transport>, pending: PendingMap, closed: Arc<AtomicBool>) {
    while let Some(message) = transport.receive().await {
        match message {
            JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => {
                let Some(id) = message.response_id().cloned() else {
                    tracing::debug!(?message, "Dropping error response without id");
                    continue;
                };
                let waiter = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(message);
                    }
                    None => tracing::debug!(id = %id, "Response for unknown or expired request"),
                }
            }
            JsonRpcMessage::Request(request) => {
                tracing::debug!(method = %request.method, "Ignoring server-initiated request");
            }
            JsonRpcMessage::Notification(note) => {
                tracing::debug!(method = %note.method, "Ignoring server notification");
            }
        }
    }

    closed.store(true, Ordering::Release);
    // Dropping the senders wakes every waiter with `Closed`.
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
    tracing::debug!("MCP transport stream ended");
}
