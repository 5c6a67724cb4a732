//! Wire transports carrying MCP messages.
//!
//! Every transport implements the same small [`Transport`] interface. Inbound
//! messages are queued by a background reader (SSE stream, HTTP response body,
//! or the in-process peer) and handed out one at a time by `receive`.

mod factory;
mod memory;
mod proxy;
mod sse;
mod streamable_http;

use std::collections::HashMap;
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

use aetherlink_core::{McpServerType, McpSettings, Platform};

use crate::protocol::JsonRpcMessage;

pub use factory::{TransportFactory, TransportProvider};
pub use memory::InMemoryTransport;
pub use proxy::{ProxyKind, needs_proxy, proxy_url};
pub use sse::{SseLineBuffer, SseTransport};
pub use streamable_http::{RetryPolicy, StreamableHttpTransport};

/// User-Agent sent by native HTTP transports.
pub const USER_AGENT: &str = "AetherLink-Mobile/1.0";

/// Errors raised while building or driving a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown built-in MCP server: {0}")]
    UnknownBuiltin(String),

    #[error("Unsupported MCP server type: {0}")]
    UnsupportedType(McpServerType),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport closed")]
    Closed,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// A bidirectional channel of JSON-RPC messages.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the underlying channel. Called once before the handshake.
    async fn start(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Deliver one message to the peer.
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError>;

    /// Deliver one message, giving up once `deadline` passes.
    ///
    /// Transports that retry internally override this so no new attempt
    /// starts after the deadline.
    async fn send_before(
        &self,
        message: JsonRpcMessage,
        deadline: Instant,
    ) -> Result<(), TransportError> {
        tokio::time::timeout_at(deadline, self.send(message))
            .await
            .map_err(|_| TransportError::Timeout("send deadline passed".to_string()))?
    }

    /// Next inbound message, or `None` once the transport is closed.
    async fn receive(&self) -> Option<JsonRpcMessage>;

    /// Close the channel. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Capabilities of the runtime the client is embedded in.
///
/// Decided once at start-up and handed to the factory.
#[derive(Debug, Clone)]
pub struct PlatformContext {
    pub platform: Platform,
    pub dev_mode: bool,
    /// Origin the CORS proxy endpoint is served from, without trailing slash.
    pub proxy_origin: String,
    pub retry: RetryPolicy,
}

impl PlatformContext {
    /// Native app with the default retry policy.
    pub fn native() -> Self {
        let settings = McpSettings::default();
        Self {
            platform: Platform::Native,
            dev_mode: false,
            proxy_origin: settings.proxy_origin,
            retry: RetryPolicy::default(),
        }
    }

    /// Build from persisted settings, validating them first.
    pub fn from_settings(settings: &McpSettings) -> Result<Self, TransportError> {
        settings
            .validate()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            platform: settings.platform,
            dev_mode: settings.dev_mode,
            proxy_origin: settings.proxy_origin.trim_end_matches('/').to_string(),
            retry: RetryPolicy {
                max_retries: settings.http_max_retries,
                base_delay: Duration::from_millis(settings.http_retry_base_delay_ms),
            },
        })
    }

    pub const fn is_web(&self) -> bool {
        matches!(self.platform, Platform::Web)
    }

    /// Proxy rewriting applies to web development builds only.
    pub const fn uses_cors_proxy(&self) -> bool {
        self.is_web() && self.dev_mode
    }
}

/// Convert configured headers into a request header map.
pub(crate) fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidConfig(format!("header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidConfig(format!("header value for '{name}': {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Queue of inbound messages shared by a transport and its reader tasks.
pub(crate) struct Inbox {
    tx: StdMutex<Option<mpsc::UnboundedSender<JsonRpcMessage>>>,
    rx: Mutex<mpsc::UnboundedReceiver<JsonRpcMessage>>,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: StdMutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }

    /// Sender handle for a reader task, or `None` once closed.
    pub(crate) fn sender(&self) -> Option<mpsc::UnboundedSender<JsonRpcMessage>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn push(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        self.sender()
            .ok_or(TransportError::Closed)?
            .send(message)
            .map_err(|_| TransportError::Closed)
    }

    pub(crate) async fn recv(&self) -> Option<JsonRpcMessage> {
        self.rx.lock().await.recv().await
    }

    /// Drop the owned sender. `recv` drains what is queued, then ends once
    /// every reader task has finished.
    pub(crate) fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::methods;

    #[tokio::test]
    async fn test_inbox_ends_after_close() {
        let inbox = Inbox::new();
        inbox
            .push(JsonRpcMessage::notification(methods::PING, None))
            .unwrap();
        inbox.close();

        assert!(inbox.recv().await.is_some());
        assert!(inbox.recv().await.is_none());
        assert!(matches!(
            inbox.push(JsonRpcMessage::notification(methods::PING, None)),
            Err(TransportError::Closed)
        ));
    }

    #[test]
    fn test_platform_context_from_settings() {
        let settings = McpSettings {
            platform: Platform::Web,
            dev_mode: true,
            ..Default::default()
        };
        let ctx = PlatformContext::from_settings(&settings).unwrap();
        assert!(ctx.uses_cors_proxy());
        assert_eq!(ctx.retry.max_retries, 3);

        assert!(!PlatformContext::native().uses_cors_proxy());
    }

    #[test]
    fn test_header_map_rejects_invalid_names() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer t".to_string());
        assert_eq!(header_map(&headers).unwrap().len(), 1);

        headers.insert("bad header".to_string(), "x".to_string());
        assert!(matches!(
            header_map(&headers),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_before_gives_up_at_deadline() {
        /// A peer that never accepts the message.
        struct Stalled;

        #[async_trait]
        impl Transport for Stalled {
            async fn send(&self, _message: JsonRpcMessage) -> Result<(), TransportError> {
                std::future::pending().await
            }

            async fn receive(&self) -> Option<JsonRpcMessage> {
                None
            }

            async fn close(&self) -> Result<(), TransportError> {
                Ok(())
            }
        }

        let deadline = Instant::now() + Duration::from_millis(200);
        let result = Stalled
            .send_before(JsonRpcMessage::notification(methods::PING, None), deadline)
            .await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
        assert!(Instant::now() >= deadline);
    }
}
