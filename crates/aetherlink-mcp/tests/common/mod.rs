//! Fake MCP servers and service builders shared by the integration tests.
//!
//! Both servers bind `127.0.0.1:0` and speak just enough MCP for the client:
//! `initialize`, `tools/list` and `tools/call`. Prompts and resources answer
//! `-32601` like a server without those capabilities.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures_util::stream::{self, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use aetherlink_core::{AppEvent, AppEventEmitter, McpSettings, MemoryKeyValueStore};
use aetherlink_mcp::McpService;

pub const SESSION_ID: &str = "session-1";

/// Answer one JSON-RPC message. `None` for notifications.
async fn respond(message: &Value) -> Option<Value> {
    let id = message.get("id")?.clone();
    let method = message.get("method").and_then(Value::as_str).unwrap_or_default();
    let params = message.get("params").cloned().unwrap_or(Value::Null);

    let result = match method {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "fake-mcp", "version": "0.0.1" },
        }),
        "ping" => json!({}),
        "tools/list" => json!({
            "tools": [
                {
                    "name": "echo",
                    "description": "Echo the text argument",
                    "inputSchema": { "type": "object", "properties": { "text": { "type": "string" } } },
                },
                {
                    "name": "slow",
                    "description": "Answer after delay_ms milliseconds",
                    "inputSchema": { "type": "object", "properties": { "delay_ms": { "type": "integer" } } },
                },
            ]
        }),
        "tools/call" => {
            let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
            match params.get("name").and_then(Value::as_str) {
                Some("echo") => {
                    let text = arguments.get("text").and_then(Value::as_str).unwrap_or_default();
                    json!({ "content": [{ "type": "text", "text": text }] })
                }
                Some("slow") => {
                    let delay = arguments.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    json!({ "content": [{ "type": "text", "text": format!("slept {delay}") }] })
                }
                other => json!({
                    "content": [{ "type": "text", "text": format!("no tool {other:?}") }],
                    "isError": true,
                }),
            }
        }
        other => {
            return Some(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {other}") },
            }));
        }
    };
    Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

// =============================================================================
// Streamable HTTP
// =============================================================================

/// What the streamable HTTP server saw, plus failure injection.
#[derive(Default)]
pub struct HttpState {
    /// Requests answered with the failure status before normal service.
    pub fail_next: AtomicUsize,
    pub fail_status: Mutex<Option<StatusCode>>,
    /// Every POST that reached the handler, failed or not.
    pub posts: AtomicUsize,
    /// `(method, mcp-session-id header)` of every request served normally.
    pub seen: Mutex<Vec<(String, Option<String>)>>,
}

impl HttpState {
    pub fn fail_with(&self, status: StatusCode, times: usize) {
        *self.fail_status.lock().unwrap() = Some(status);
        self.fail_next.store(times, Ordering::SeqCst);
    }

    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(String, Option<String>)> {
        self.seen.lock().unwrap().clone()
    }
}

pub struct FakeServer<S> {
    pub base_url: String,
    pub state: Arc<S>,
    handle: JoinHandle<()>,
}

impl<S> Drop for FakeServer<S> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve<S: Send + Sync + 'static>(router: Router, state: Arc<S>) -> FakeServer<S> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    FakeServer {
        base_url: format!("http://{addr}"),
        state,
        handle,
    }
}

/// Start a streamable HTTP MCP server answering at `{base_url}/mcp`.
pub async fn start_http_server() -> FakeServer<HttpState> {
    let state = Arc::new(HttpState::default());
    let router = Router::new()
        .route("/mcp", post(http_post))
        .with_state(Arc::clone(&state));
    serve(router, state).await
}

async fn http_post(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.posts.fetch_add(1, Ordering::SeqCst);
    let failing = state
        .fail_next
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        let status = state
            .fail_status
            .lock()
            .unwrap()
            .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
        return (status, "injected failure").into_response();
    }

    let Ok(message) = serde_json::from_str::<Value>(&body) else {
        return (StatusCode::BAD_REQUEST, "bad json").into_response();
    };
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let session = headers
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    state.seen.lock().unwrap().push((method.clone(), session));

    let Some(reply) = respond(&message).await else {
        return StatusCode::ACCEPTED.into_response();
    };
    let mut response = (
        [(header::CONTENT_TYPE, "application/json")],
        reply.to_string(),
    )
        .into_response();
    if method == "initialize" {
        response
            .headers_mut()
            .insert("mcp-session-id", SESSION_ID.parse().unwrap());
    }
    response
}

// =============================================================================
// SSE
// =============================================================================

/// Open SSE sessions by id, and how many streams were opened in total.
#[derive(Default)]
pub struct SseState {
    pub sessions: Mutex<HashMap<usize, mpsc::UnboundedSender<String>>>,
    pub streams_opened: AtomicUsize,
}

impl SseState {
    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }
}

/// Start an SSE MCP server: stream at `{base_url}/sse`, posts to the
/// endpoint it announces.
pub async fn start_sse_server() -> FakeServer<SseState> {
    let state = Arc::new(SseState::default());
    let router = Router::new()
        .route("/sse", get(sse_stream))
        .route("/messages", post(sse_post))
        .with_state(Arc::clone(&state));
    serve(router, state).await
}

async fn sse_stream(State(state): State<Arc<SseState>>) -> Response {
    let session = state.streams_opened.fetch_add(1, Ordering::SeqCst);
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    state.sessions.lock().unwrap().insert(session, tx);

    let endpoint = format!("event: endpoint\ndata: /messages?session={session}\n\n");
    let messages = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|json| (format!("event: message\ndata: {json}\n\n"), rx))
    });
    let body = stream::once(async move { endpoint })
        .chain(messages)
        .map(Ok::<_, Infallible>);

    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(body),
    )
        .into_response()
}

async fn sse_post(
    State(state): State<Arc<SseState>>,
    axum::extract::Query(query): axum::extract::Query<HashMap<String, usize>>,
    body: String,
) -> StatusCode {
    let Ok(message) = serde_json::from_str::<Value>(&body) else {
        return StatusCode::BAD_REQUEST;
    };
    let Some(tx) = query
        .get("session")
        .and_then(|session| state.sessions.lock().unwrap().get(session).cloned())
    else {
        return StatusCode::NOT_FOUND;
    };
    tokio::spawn(async move {
        if let Some(reply) = respond(&message).await {
            let _ = tx.send(reply.to_string());
        }
    });
    StatusCode::ACCEPTED
}

// =============================================================================
// Service helpers
// =============================================================================

/// Records emitted event names.
#[derive(Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<AppEvent>>>,
}

impl RecordingEmitter {
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(AppEvent::event_name)
            .collect()
    }
}

impl AppEventEmitter for RecordingEmitter {
    fn emit(&self, event: AppEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}

/// Settings with fast retries so failure tests stay quick.
pub fn fast_settings(max_retries: u32) -> McpSettings {
    McpSettings {
        http_max_retries: max_retries,
        http_retry_base_delay_ms: 10,
        ..McpSettings::default()
    }
}

pub fn service_with(settings: McpSettings) -> (McpService, RecordingEmitter) {
    let emitter = RecordingEmitter::default();
    let service = McpService::from_settings(
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(emitter.clone()),
        settings,
    )
    .unwrap();
    (service, emitter)
}
