//! High-level MCP service for managing MCP servers.
//!
//! This is the one object adapters hold. It is built once at start-up with
//! its storage, transport provider and event emitter injected, and owns the
//! connection cache for its lifetime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use aetherlink_core::{
    AppEvent, AppEventEmitter, CallToolResult, KeyValueStore, McpErrorInfo, McpPrompt,
    McpResource, McpServer, McpServiceError, McpSettings, McpTool, ToolCallRequest,
};

use crate::builtin;
use crate::catalog::ToolCatalog;
use crate::client::{ClientInfo, McpClient, McpClientError};
use crate::connection::ConnectionManager;
use crate::invoker::ToolInvoker;
use crate::orchestrator::{Orchestrator, ToolCallCallback, ToolCallInput};
use crate::registry::ServerRegistry;
use crate::transport::{PlatformContext, TransportError, TransportFactory, TransportProvider};

/// Fields a caller may set when adding a built-in server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltinOverrides {
    /// Record id. Defaults to `builtin-<unix millis>`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Merged over the default environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Replaces the default arguments when non-empty.
    #[serde(default)]
    pub args: Vec<String>,
    /// Defaults to active.
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// MCP service providing unified access to MCP server management.
pub struct McpService {
    registry: Arc<ServerRegistry>,
    provider: Arc<dyn TransportProvider>,
    connections: Arc<ConnectionManager>,
    catalog: ToolCatalog,
    invoker: Arc<ToolInvoker>,
    orchestrator: Orchestrator,
    emitter: Arc<dyn AppEventEmitter>,
    settings: McpSettings,
}

impl McpService {
    /// Create a new MCP service with injected dependencies.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn TransportProvider>,
        emitter: Arc<dyn AppEventEmitter>,
        settings: McpSettings,
    ) -> Self {
        let registry = Arc::new(ServerRegistry::new(store));
        let connections = Arc::new(ConnectionManager::new(
            Arc::clone(&provider),
            ClientInfo::from_settings(&settings),
        ));
        let invoker = Arc::new(ToolInvoker::new(Arc::clone(&connections)));
        Self {
            catalog: ToolCatalog::new(Arc::clone(&connections)),
            orchestrator: Orchestrator::new(Arc::clone(&registry), Arc::clone(&invoker)),
            registry,
            provider,
            connections,
            invoker,
            emitter,
            settings,
        }
    }

    /// Create a service whose transports follow the platform in `settings`.
    pub fn from_settings(
        store: Arc<dyn KeyValueStore>,
        emitter: Arc<dyn AppEventEmitter>,
        settings: McpSettings,
    ) -> Result<Self, McpServiceError> {
        let platform = PlatformContext::from_settings(&settings)
            .map_err(|e| McpServiceError::InvalidConfig(e.to_string()))?;
        let provider = Arc::new(TransportFactory::new(platform));
        Ok(Self::new(store, provider, emitter, settings))
    }

    pub const fn settings(&self) -> &McpSettings {
        &self.settings
    }

    // =========================================================================
    // Configuration CRUD
    // =========================================================================

    pub async fn list_servers(&self) -> Result<Vec<McpServer>, McpServiceError> {
        Ok(self.registry.list().await?)
    }

    pub async fn get_server(&self, id: &str) -> Result<McpServer, McpServiceError> {
        self.registry
            .get(id)
            .await?
            .ok_or_else(|| McpServiceError::NotFound(id.to_string()))
    }

    pub async fn get_active_servers(&self) -> Result<Vec<McpServer>, McpServiceError> {
        Ok(self.registry.active().await?)
    }

    /// Add a new MCP server configuration.
    pub async fn add_server(&self, server: McpServer) -> Result<McpServer, McpServiceError> {
        let saved = self.registry.add(server).await?;
        self.emitter.emit(AppEvent::mcp_server_added(&saved));
        tracing::info!(server_id = %saved.id, server_name = %saved.name, "Added MCP server configuration");
        Ok(saved)
    }

    /// Replace a server configuration.
    ///
    /// Returns `false` when no server has that id. The old connection is
    /// dropped when the record's connection identity changes or the record
    /// is no longer active.
    pub async fn update_server(&self, server: McpServer) -> Result<bool, McpServiceError> {
        let previous = self.registry.get(&server.id).await?;
        let updated = self.registry.update(server.clone()).await?;

        if let Some(previous) = previous.filter(|_| updated) {
            let old_key = previous.connection_key();
            if old_key != server.connection_key() || !server.is_active {
                self.connections.close(&old_key).await;
            }
            tracing::info!(server_id = %server.id, server_name = %server.name, "Updated MCP server configuration");
        }
        Ok(updated)
    }

    /// Remove a server configuration, closing its connection first.
    pub async fn remove_server(&self, id: &str) -> Result<(), McpServiceError> {
        let server = self.get_server(id).await?;
        self.connections.close(&server.connection_key()).await;
        self.registry.remove(id).await?;

        self.emitter.emit(AppEvent::mcp_server_removed(id));
        tracing::info!(server_id = %id, server_name = %server.name, "Removed MCP server configuration");
        Ok(())
    }

    /// Add one of the built-in servers by name.
    pub async fn add_builtin_server(
        &self,
        name: &str,
        overrides: BuiltinOverrides,
    ) -> Result<McpServer, McpServiceError> {
        let mut server = builtin::builtin_servers()
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| {
                McpServiceError::InvalidConfig(format!("unknown built-in MCP server: {name}"))
            })?;

        server.id = overrides
            .id
            .unwrap_or_else(|| format!("builtin-{}", chrono::Utc::now().timestamp_millis()));
        if let Some(description) = overrides.description {
            server.description = Some(description);
        }
        server.env.extend(overrides.env);
        if !overrides.args.is_empty() {
            server.args = overrides.args;
        }
        server.is_active = overrides.is_active.unwrap_or(true);
        server.timeout_secs = self.settings.default_timeout_secs;

        self.add_server(server).await
    }

    // =========================================================================
    // Connection Lifecycle
    // =========================================================================

    /// Activate or deactivate a server.
    ///
    /// Deactivating closes the live connection before the flag is persisted.
    /// Activating persists the flag and connects; if the connection fails the
    /// flag is rolled back to `false` and the error returned.
    pub async fn toggle_server(&self, id: &str, active: bool) -> Result<McpServer, McpServiceError> {
        let server = self.get_server(id).await?;

        if !active {
            self.connections.close(&server.connection_key()).await;
            let saved = self.registry.set_active(id, false).await?;
            self.emitter
                .emit(AppEvent::mcp_server_stopped(&saved.id, &saved.name));
            tracing::info!(server_name = %saved.name, "Deactivated MCP server");
            return Ok(saved);
        }

        let saved = self.registry.set_active(id, true).await?;
        match self.connections.ensure_connected(&saved).await {
            Ok(_) => {
                self.emitter
                    .emit(AppEvent::mcp_server_started(&saved.id, &saved.name));
                tracing::info!(server_name = %saved.name, "Activated MCP server");
                Ok(saved)
            }
            Err(e) => {
                let error = service_error(&e);
                if let Err(rollback) = self.registry.set_active(id, false).await {
                    tracing::error!(
                        server_name = %saved.name,
                        error = %rollback,
                        "Failed to roll back isActive after connection failure"
                    );
                }
                self.emit_error(&saved, &error);
                Err(error)
            }
        }
    }

    /// Close the live connection without changing the persisted flag.
    pub async fn stop_server(&self, id: &str) -> Result<(), McpServiceError> {
        let server = self.get_server(id).await?;
        if self.connections.close(&server.connection_key()).await {
            self.emitter
                .emit(AppEvent::mcp_server_stopped(&server.id, &server.name));
        }
        Ok(())
    }

    /// Close the live connection and reconnect if the server is active.
    pub async fn restart_server(&self, id: &str) -> Result<(), McpServiceError> {
        let server = self.get_server(id).await?;
        self.connections.close(&server.connection_key()).await;
        if !server.is_active {
            return Ok(());
        }

        match self.connections.ensure_connected(&server).await {
            Ok(_) => {
                self.emitter
                    .emit(AppEvent::mcp_server_started(&server.id, &server.name));
                Ok(())
            }
            Err(e) => {
                let error = service_error(&e);
                self.emit_error(&server, &error);
                Err(error)
            }
        }
    }

    /// Check that a configuration connects and lists tools.
    ///
    /// Uses a throwaway connection, so the cache is untouched.
    pub async fn test_connection(&self, server: &McpServer) -> bool {
        let outcome = async {
            let transport = self.provider.create(server)?;
            let client = McpClient::connect(
                transport,
                &ClientInfo::from_settings(&self.settings),
                "test",
                Duration::from_secs(server.timeout_secs.max(1)),
            )
            .await?;
            let tools = client.list_tools().await;
            client.close().await;
            tools
        }
        .await;

        match outcome {
            Ok(tools) => {
                tracing::info!(server_name = %server.name, tools = tools.len(), "MCP connection test passed");
                true
            }
            Err(e) => {
                tracing::warn!(server_name = %server.name, error = %e, "MCP connection test failed");
                false
            }
        }
    }

    /// Close every live connection.
    pub async fn cleanup(&self) {
        self.connections.close_all().await;
        tracing::debug!("Closed all MCP connections");
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    pub async fn list_tools(&self, id: &str) -> Result<Vec<McpTool>, McpServiceError> {
        let server = self.get_server(id).await?;
        Ok(self.catalog.list_tools(&server).await)
    }

    pub async fn list_prompts(&self, id: &str) -> Result<Vec<McpPrompt>, McpServiceError> {
        let server = self.get_server(id).await?;
        Ok(self.catalog.list_prompts(&server).await)
    }

    pub async fn list_resources(&self, id: &str) -> Result<Vec<McpResource>, McpServiceError> {
        let server = self.get_server(id).await?;
        Ok(self.catalog.list_resources(&server).await)
    }

    /// Tools of every active server. Servers that fail contribute nothing.
    pub async fn get_all_available_tools(&self) -> Result<Vec<McpTool>, McpServiceError> {
        let servers = self.get_active_servers().await?;
        Ok(self.catalog.all_tools(&servers).await)
    }

    pub async fn get_prompt(
        &self,
        id: &str,
        name: &str,
        arguments: HashMap<String, String>,
    ) -> Result<Value, McpServiceError> {
        let server = self.get_server(id).await?;
        let client = self
            .connections
            .ensure_connected(&server)
            .await
            .map_err(|e| service_error(&e))?;
        client
            .get_prompt(name, arguments)
            .await
            .map_err(|e| McpServiceError::Internal(e.to_string()))
    }

    pub async fn read_resource(&self, id: &str, uri: &str) -> Result<Value, McpServiceError> {
        let server = self.get_server(id).await?;
        let client = self
            .connections
            .ensure_connected(&server)
            .await
            .map_err(|e| service_error(&e))?;
        client
            .read_resource(uri)
            .await
            .map_err(|e| McpServiceError::Internal(e.to_string()))
    }

    // =========================================================================
    // Invocation
    // =========================================================================

    /// Call a tool on a registered server. Failures come back as an error
    /// result.
    pub async fn call_tool(&self, server_id: &str, tool_name: &str, arguments: Value) -> CallToolResult {
        let server = match self.get_server(server_id).await {
            Ok(server) => server,
            Err(e) => return CallToolResult::error(format!("tool call failed: {tool_name}: {e}")),
        };

        let result = self.invoker.call(&server, tool_name, arguments).await;
        if result.is_error {
            self.emitter.emit(AppEvent::mcp_server_error(McpErrorInfo::tool(
                Some(server.id.clone()),
                &server.name,
                result.joined_text(),
            )));
        }
        result
    }

    /// Extract and run tool calls, emitting a status event per finished call.
    pub async fn parse_and_call_tools(
        &self,
        input: ToolCallInput<'_>,
        tools: &[McpTool],
        on_update: Option<ToolCallCallback<'_>>,
    ) -> Vec<CallToolResult> {
        let notify = |request: &ToolCallRequest, result: &CallToolResult| {
            self.emitter.emit(AppEvent::tool_call_updated(
                &request.id,
                &request.tool.id,
                request.status,
            ));
            if let Some(callback) = on_update {
                callback(request, result);
            }
        };
        self.orchestrator
            .parse_and_call_tools(input, tools, Some(&notify))
            .await
    }

    fn emit_error(&self, server: &McpServer, error: &McpServiceError) {
        self.emitter.emit(AppEvent::mcp_server_error(McpErrorInfo::from_error(
            Some(server.id.clone()),
            &server.name,
            error,
        )));
    }
}

/// Map a connection failure onto the service taxonomy.
fn service_error(error: &McpClientError) -> McpServiceError {
    match error {
        McpClientError::Transport(
            TransportError::InvalidConfig(_)
            | TransportError::UnknownBuiltin(_)
            | TransportError::UnsupportedType(_),
        ) => McpServiceError::InvalidConfig(error.to_string()),
        _ => McpServiceError::Connection(error.to_string()),
    }
}
