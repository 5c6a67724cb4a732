//! Concurrent execution of extracted tool calls.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::join_all;

use aetherlink_core::{CallToolResult, McpTool, ToolCallRequest, ToolCallStatus};

use crate::invoker::ToolInvoker;
use crate::parser::parse_tool_use;
use crate::registry::ServerRegistry;

/// Receives each call once it reaches `done` or `error`.
pub type ToolCallCallback<'a> = &'a (dyn Fn(&ToolCallRequest, &CallToolResult) + Send + Sync);

/// What to run: model output still to be parsed, or calls parsed earlier.
#[derive(Debug, Clone)]
pub enum ToolCallInput<'a> {
    Text(&'a str),
    Requests(Vec<ToolCallRequest>),
}

impl<'a> From<&'a str> for ToolCallInput<'a> {
    fn from(text: &'a str) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<ToolCallRequest>> for ToolCallInput<'_> {
    fn from(requests: Vec<ToolCallRequest>) -> Self {
        Self::Requests(requests)
    }
}

pub struct Orchestrator {
    registry: Arc<ServerRegistry>,
    invoker: Arc<ToolInvoker>,
}

impl Orchestrator {
    pub const fn new(registry: Arc<ServerRegistry>, invoker: Arc<ToolInvoker>) -> Self {
        Self { registry, invoker }
    }

    /// Run every call concurrently and return the results in input order.
    ///
    /// One failing call never affects the others: every failure, including
    /// a panic inside the invocation, becomes an error result for that call.
    pub async fn parse_and_call_tools(
        &self,
        input: ToolCallInput<'_>,
        tools: &[McpTool],
        on_update: Option<ToolCallCallback<'_>>,
    ) -> Vec<CallToolResult> {
        let requests = match input {
            ToolCallInput::Text(text) => parse_tool_use(text, tools),
            ToolCallInput::Requests(requests) => requests,
        };
        if requests.is_empty() {
            return Vec::new();
        }
        tracing::debug!(count = requests.len(), "Dispatching tool calls");

        join_all(
            requests
                .into_iter()
                .map(|request| self.run_one(request, on_update)),
        )
        .await
    }

    async fn run_one(
        &self,
        mut request: ToolCallRequest,
        on_update: Option<ToolCallCallback<'_>>,
    ) -> CallToolResult {
        if !request.transition(ToolCallStatus::Invoking) {
            tracing::debug!(
                request_id = %request.id,
                status = ?request.status,
                "Tool call is not pending, not running it again"
            );
            return request.response.clone().unwrap_or_else(|| {
                CallToolResult::error(format!(
                    "tool call {} was already {:?}",
                    request.id, request.status
                ))
            });
        }

        let result = AssertUnwindSafe(self.invoke(&request))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                tracing::error!(request_id = %request.id, "Tool invocation panicked");
                CallToolResult::error(format!(
                    "tool call failed: {}: invocation panicked",
                    request.tool.name
                ))
            });

        request.complete(&result);
        if let Some(callback) = on_update {
            callback(&request, &result);
        }
        result
    }

    async fn invoke(&self, request: &ToolCallRequest) -> CallToolResult {
        let tool = &request.tool;
        match self.registry.get(&tool.server_id).await {
            Ok(Some(server)) => {
                self.invoker
                    .call(&server, &tool.name, request.arguments.clone())
                    .await
            }
            Ok(None) => CallToolResult::error(format!(
                "tool call failed: {}: MCP server not found: {}",
                tool.name, tool.server_name
            )),
            Err(e) => CallToolResult::error(format!("tool call failed: {}: {e}", tool.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientInfo;
    use crate::connection::ConnectionManager;
    use crate::transport::{PlatformContext, TransportFactory};
    use aetherlink_core::{McpServer, MemoryKeyValueStore};
    use serde_json::json;
    use std::sync::Mutex;

    async fn orchestrator() -> Orchestrator {
        let registry = Arc::new(ServerRegistry::new(Arc::new(MemoryKeyValueStore::new())));
        registry
            .add(McpServer::new_in_memory("mem", "@aether/memory"))
            .await
            .unwrap();
        let connections = Arc::new(ConnectionManager::new(
            Arc::new(TransportFactory::new(PlatformContext::native())),
            ClientInfo::default(),
        ));
        Orchestrator::new(registry, Arc::new(ToolInvoker::new(connections)))
    }

    fn memory_tool(name: &str) -> McpTool {
        McpTool::new(format!("mem-{name}"), name, "mem", "@aether/memory")
    }

    #[tokio::test]
    async fn test_text_input_runs_calls_and_reports_each() {
        let orchestrator = orchestrator().await;
        let tools = vec![memory_tool("read_graph"), memory_tool("bogus")];
        let text = "<tool_use><name>mem-read_graph</name><arguments>{}</arguments></tool_use>\
            <tool_use><name>bogus</name><arguments>{}</arguments></tool_use>";

        let seen = Mutex::new(Vec::new());
        let callback = |request: &ToolCallRequest, _: &CallToolResult| {
            seen.lock().unwrap().push((request.tool.name.clone(), request.status));
        };
        let results = orchestrator
            .parse_and_call_tools(text.into(), &tools, Some(&callback))
            .await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].is_error);
        assert!(results[1].is_error);

        let mut seen = seen.into_inner().unwrap();
        seen.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            seen,
            vec![
                ("bogus".to_string(), ToolCallStatus::Error),
                ("read_graph".to_string(), ToolCallStatus::Done),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_server_is_error_result() {
        let orchestrator = orchestrator().await;
        let tool = McpTool::new("x-y", "y", "gone", "gone-server");
        let request = ToolCallRequest::pending("x-y-1", tool, json!({}));
        let results = orchestrator
            .parse_and_call_tools(vec![request].into(), &[], None)
            .await;
        assert!(results[0].is_error);
        assert!(results[0].joined_text().contains("not found"));
    }

    #[tokio::test]
    async fn test_terminal_request_is_not_rerun() {
        let orchestrator = orchestrator().await;
        let mut request = ToolCallRequest::pending("r-1", memory_tool("read_graph"), json!({}));
        request.transition(ToolCallStatus::Invoking);
        request.complete(&CallToolResult::text("cached"));

        let results = orchestrator
            .parse_and_call_tools(vec![request].into(), &[], None)
            .await;
        assert_eq!(results[0].joined_text(), "cached");
    }

    #[tokio::test]
    async fn test_empty_input() {
        let orchestrator = orchestrator().await;
        assert!(
            orchestrator
                .parse_and_call_tools("no calls here".into(), &[memory_tool("read_graph")], None)
                .await
                .is_empty()
        );
    }
}
