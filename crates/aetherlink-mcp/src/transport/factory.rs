//! Transport selection per server record and platform.

use std::sync::Arc;
use std::time::Duration;

use aetherlink_core::{McpServer, McpServerType};

use super::proxy::{ProxyKind, proxy_url};
use super::{
    InMemoryTransport, PlatformContext, RetryPolicy, SseTransport, StreamableHttpTransport,
    Transport, TransportError, USER_AGENT,
};
use crate::builtin;

/// Builds an unopened transport for a server record.
///
/// The connection manager only sees this trait, so tests can hand it a
/// provider that counts or fakes connections.
pub trait TransportProvider: Send + Sync {
    fn create(&self, server: &McpServer) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Production transport provider.
///
/// | type | platform | transport |
/// |---|---|---|
/// | inMemory | any | linked pair driving a built-in server |
/// | sse | native / web prod | direct SSE |
/// | sse | web dev | SSE through the CORS proxy |
/// | streamableHttp | native | direct, with retry and backoff |
/// | streamableHttp | web | through the CORS proxy in dev, no retry |
pub struct TransportFactory {
    platform: PlatformContext,
    http: reqwest::Client,
}

impl TransportFactory {
    pub fn new(platform: PlatformContext) -> Self {
        Self::with_client(platform, reqwest::Client::new())
    }

    pub const fn with_client(platform: PlatformContext, http: reqwest::Client) -> Self {
        Self { platform, http }
    }

    pub const fn platform(&self) -> &PlatformContext {
        &self.platform
    }

    fn endpoint<'a>(&self, server: &'a McpServer) -> Result<&'a str, TransportError> {
        server.base_url().ok_or_else(|| {
            TransportError::InvalidConfig(format!(
                "{} server '{}' requires a baseUrl",
                server.server_type, server.name
            ))
        })
    }

    fn resolve_url(&self, url: &str, kind: ProxyKind) -> String {
        if self.platform.uses_cors_proxy() {
            proxy_url(url, &self.platform.proxy_origin, kind)
        } else {
            url.to_string()
        }
    }
}

impl TransportProvider for TransportFactory {
    fn create(&self, server: &McpServer) -> Result<Arc<dyn Transport>, TransportError> {
        let timeout = Duration::from_secs(server.timeout_secs.max(1));

        let transport: Arc<dyn Transport> = match server.server_type {
            McpServerType::InMemory => {
                let instance = builtin::create_server(server)?;
                Arc::new(InMemoryTransport::for_builtin(instance))
            }
            McpServerType::Sse => {
                let url = self.resolve_url(self.endpoint(server)?, ProxyKind::Sse);
                Arc::new(SseTransport::new(
                    self.http.clone(),
                    &url,
                    &server.headers,
                    timeout,
                )?)
            }
            McpServerType::StreamableHttp if self.platform.is_web() => {
                let url = self.resolve_url(self.endpoint(server)?, ProxyKind::Http);
                Arc::new(StreamableHttpTransport::new(
                    self.http.clone(),
                    &url,
                    &server.headers,
                    timeout,
                    RetryPolicy::none(),
                )?)
            }
            McpServerType::StreamableHttp => Arc::new(
                StreamableHttpTransport::new(
                    self.http.clone(),
                    self.endpoint(server)?,
                    &server.headers,
                    timeout,
                    self.platform.retry,
                )?
                .with_user_agent(USER_AGENT),
            ),
            McpServerType::Stdio => {
                return Err(TransportError::UnsupportedType(server.server_type));
            }
        };

        tracing::debug!(
            server_name = %server.name,
            server_type = %server.server_type,
            platform = ?self.platform.platform,
            "Created MCP transport"
        );
        Ok(transport)
    }
}
