//! Streaming HTTP transport.
//!
//! Every client message is one `POST`. The server answers with a JSON body
//! (a message or a batch), an event stream of messages, or `202 Accepted`
//! with no body. A session id assigned by the server is echoed on every
//! later request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use super::sse::{SseEventParser, SseLineBuffer, is_event_stream_content_type};
use super::{Inbox, Transport, TransportError, header_map};
use crate::protocol::{JsonRpcMessage, decode_messages};

/// Header carrying the server-assigned session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Shortest attempt worth starting before a deadline.
const MIN_ATTEMPT: Duration = Duration::from_millis(50);

/// What one successful POST produced.
enum Reply {
    /// `202`/`204` or an empty body.
    Empty,
    /// Event-stream body, read in the background.
    Stream(reqwest::Response),
    Messages(Vec<JsonRpcMessage>),
}

/// Exponential backoff for failed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based): `2^retry * base`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Client half of the streaming HTTP transport.
pub struct StreamableHttpTransport {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
    request_timeout: Duration,
    retry: RetryPolicy,
    session_id: StdMutex<Option<String>>,
    inbox: Arc<Inbox>,
    readers: StdMutex<Vec<JoinHandle<()>>>,
}

impl StreamableHttpTransport {
    pub fn new(
        client: reqwest::Client,
        url: &str,
        headers: &HashMap<String, String>,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, TransportError> {
        let url = Url::parse(url)
            .map_err(|e| TransportError::InvalidConfig(format!("invalid HTTP URL '{url}': {e}")))?;
        Ok(Self {
            client,
            url,
            headers: header_map(headers)?,
            request_timeout,
            retry,
            session_id: StdMutex::new(None),
            inbox: Arc::new(Inbox::new()),
            readers: StdMutex::new(Vec::new()),
        })
    }

    /// Send `user_agent` unless the configured headers already set one.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: &'static str) -> Self {
        if !self.headers.contains_key(USER_AGENT) {
            self.headers
                .insert(USER_AGENT, HeaderValue::from_static(user_agent));
        }
        self
    }

    pub const fn url(&self) -> &Url {
        &self.url
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Session id assigned by the server, if any.
    pub fn session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// POST `body`, retrying any failed attempt with exponential backoff.
    ///
    /// With a `deadline`, each attempt is cut short at the deadline and no
    /// retry starts unless its backoff plus [`MIN_ATTEMPT`] still fits.
    async fn exchange_with_retry(
        &self,
        body: &[u8],
        deadline: Option<Instant>,
    ) -> Result<Reply, TransportError> {
        let mut retry = 0;
        loop {
            let attempt_timeout = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(TransportError::Timeout(format!("POST {}", self.url)));
                    }
                    remaining.min(self.request_timeout)
                }
                None => self.request_timeout,
            };

            let e = match self.exchange_once(body, attempt_timeout).await {
                Ok(reply) => return Ok(reply),
                Err(e) => e,
            };
            if retry >= self.retry.max_retries {
                return Err(e);
            }
            let delay = self.retry.delay_for(retry);
            if deadline.is_some_and(|d| Instant::now() + delay + MIN_ATTEMPT >= d) {
                tracing::warn!(url = %self.url, error = %e, "MCP HTTP request failed, no time left to retry");
                return Err(e);
            }

            retry += 1;
            tracing::warn!(
                url = %self.url,
                attempt = retry,
                max_retries = self.retry.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %e,
                "MCP HTTP request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// One POST, read through to the decoded reply.
    async fn exchange_once(&self, body: &[u8], timeout: Duration) -> Result<Reply, TransportError> {
        let mut request = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .timeout(timeout)
            .body(body.to_vec());
        if let Some(session_id) = self.session_id() {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }
        self.capture_session(&response);

        if matches!(status, StatusCode::ACCEPTED | StatusCode::NO_CONTENT) {
            return Ok(Reply::Empty);
        }
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_event_stream_content_type);
        if is_stream {
            return Ok(Reply::Stream(response));
        }

        let text = response.text().await.map_err(|e| self.request_error(e))?;
        if text.trim().is_empty() {
            return Ok(Reply::Empty);
        }
        Ok(Reply::Messages(decode_messages(&text)?))
    }

    fn request_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(format!("POST {}", self.url))
        } else {
            TransportError::Request(e)
        }
    }

    async fn deliver(
        &self,
        message: &JsonRpcMessage,
        deadline: Option<Instant>,
    ) -> Result<(), TransportError> {
        if self.inbox.is_closed() {
            return Err(TransportError::Closed);
        }

        let body = serde_json::to_vec(message)?;
        match self.exchange_with_retry(&body, deadline).await? {
            Reply::Empty => {}
            Reply::Stream(response) => {
                let handle = tokio::spawn(read_event_stream(response, Arc::clone(&self.inbox)));
                let mut readers = self.readers.lock().unwrap_or_else(PoisonError::into_inner);
                readers.retain(|h| !h.is_finished());
                readers.push(handle);
            }
            Reply::Messages(messages) => {
                for message in messages {
                    self.inbox.push(message)?;
                }
            }
        }
        Ok(())
    }

    fn capture_session(&self, response: &reqwest::Response) {
        let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return;
        };
        let mut current = self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if current.as_deref() != Some(session_id) {
            tracing::debug!(url = %self.url, session_id, "MCP session assigned");
            *current = Some(session_id.to_string());
        }
    }
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        self.deliver(&message, None).await
    }

    async fn send_before(
        &self,
        message: JsonRpcMessage,
        deadline: Instant,
    ) -> Result<(), TransportError> {
        let delivery = self.deliver(&message, Some(deadline));
        tokio::time::timeout_at(deadline, delivery)
            .await
            .map_err(|_| TransportError::Timeout(format!("POST {}", self.url)))?
    }

    async fn receive(&self) -> Option<JsonRpcMessage> {
        self.inbox.recv().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inbox.close();
        for handle in self
            .readers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            handle.abort();
        }
        Ok(())
    }
}

/// Forward every `data:` message of an event-stream response body.
async fn read_event_stream(response: reqwest::Response, inbox: Arc<Inbox>) {
    let mut stream = response.bytes_stream();
    let mut lines = SseLineBuffer::default();
    let mut parser = SseEventParser::default();

    let mut forward = |line: &str| {
        let Some(event) = parser.feed(line) else {
            return;
        };
        if event.data.is_empty() {
            return;
        }
        match decode_messages(&event.data) {
            Ok(messages) => {
                for message in messages {
                    if inbox.push(message).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring malformed event-stream message"),
        }
    };

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                for line in lines.push(&chunk) {
                    forward(&line);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "MCP event-stream response failed");
                return;
            }
        }
    }
    for line in lines.finish() {
        forward(&line);
    }
}
