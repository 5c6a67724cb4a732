//! Legacy MCP HTTP+SSE transport.
//!
//! The client opens a long-lived `GET` event stream. The first `endpoint`
//! event names the URL that client messages are POSTed to; every later
//! `message` event carries one JSON-RPC message from the server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

use super::{Inbox, Transport, TransportError, header_map};
use crate::protocol::JsonRpcMessage;

/// Splits a byte stream into trimmed, non-empty lines.
#[derive(Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    pub fn finish(&mut self) -> Vec<String> {
        self.drain_lines(true)
    }

    fn drain_lines(&mut self, flush: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut search_index = 0;

        while let Some(relative_pos) = self.buffer[search_index..].iter().position(|b| *b == b'\n')
        {
            let newline_index = search_index + relative_pos;
            push_trimmed(&mut lines, &self.buffer[search_index..newline_index]);
            search_index = newline_index + 1;
        }

        if flush {
            push_trimmed(&mut lines, &self.buffer[search_index..]);
            self.buffer.clear();
        } else if search_index > 0 {
            self.buffer.drain(..search_index);
        }

        lines
    }
}

fn push_trimmed(lines: &mut Vec<String>, bytes: &[u8]) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    /// Event name; `message` when the stream did not name it.
    pub event: String,
    pub data: String,
}

/// Pairs `event:` lines with the `data:` line that follows them.
#[derive(Default)]
pub(crate) struct SseEventParser {
    pending_event: Option<String>,
}

impl SseEventParser {
    pub(crate) fn feed(&mut self, line: &str) -> Option<SseEvent> {
        if let Some(name) = line.strip_prefix("event:") {
            self.pending_event = Some(name.trim().to_string());
            return None;
        }
        let data = sse_data_payload(line)?;
        let event = self
            .pending_event
            .take()
            .unwrap_or_else(|| "message".to_string());
        Some(SseEvent {
            event,
            data: data.to_string(),
        })
    }
}

pub(crate) fn sse_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

pub(crate) fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

/// Client half of the HTTP+SSE transport.
pub struct SseTransport {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
    read_timeout: Duration,
    endpoint: StdMutex<Option<Url>>,
    inbox: Arc<Inbox>,
    reader: StdMutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    pub fn new(
        client: reqwest::Client,
        url: &str,
        headers: &HashMap<String, String>,
        read_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let url = Url::parse(url)
            .map_err(|e| TransportError::InvalidConfig(format!("invalid SSE URL '{url}': {e}")))?;
        Ok(Self {
            client,
            url,
            headers: header_map(headers)?,
            read_timeout,
            endpoint: StdMutex::new(None),
            inbox: Arc::new(Inbox::new()),
            reader: StdMutex::new(None),
        })
    }

    pub const fn url(&self) -> &Url {
        &self.url
    }

    fn endpoint(&self) -> Option<Url> {
        self.endpoint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn start(&self) -> Result<(), TransportError> {
        let request = self
            .client
            .get(self.url.clone())
            .headers(self.headers.clone())
            .header(ACCEPT, "text/event-stream")
            .send();
        let response = tokio::time::timeout(self.read_timeout, request)
            .await
            .map_err(|_| TransportError::Timeout(format!("opening SSE stream {}", self.url)))??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let (endpoint_tx, endpoint_rx) = oneshot::channel();
        let handle = tokio::spawn(pump_events(
            response,
            self.url.clone(),
            Arc::clone(&self.inbox),
            endpoint_tx,
            self.read_timeout,
        ));
        *self.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        let endpoint = tokio::time::timeout(self.read_timeout, endpoint_rx)
            .await
            .map_err(|_| TransportError::Timeout("waiting for SSE endpoint event".to_string()))?
            .map_err(|_| TransportError::Protocol("SSE stream ended before endpoint event".to_string()))?;

        tracing::debug!(url = %self.url, endpoint = %endpoint, "SSE endpoint received");
        *self.endpoint.lock().unwrap_or_else(PoisonError::into_inner) = Some(endpoint);
        Ok(())
    }

    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.inbox.is_closed() {
            return Err(TransportError::Closed);
        }
        let endpoint = self
            .endpoint()
            .ok_or_else(|| TransportError::Protocol("SSE transport not started".to_string()))?;

        let response = self
            .client
            .post(endpoint)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn receive(&self) -> Option<JsonRpcMessage> {
        self.inbox.recv().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inbox.close();
        if let Some(handle) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        Ok(())
    }
}

/// Read the event stream until it ends, goes idle past `read_timeout`, or
/// the transport closes.
async fn pump_events(
    response: reqwest::Response,
    stream_url: Url,
    inbox: Arc<Inbox>,
    endpoint_tx: oneshot::Sender<Url>,
    read_timeout: Duration,
) {
    let mut endpoint_tx = Some(endpoint_tx);
    let mut stream = response.bytes_stream();
    let mut lines = SseLineBuffer::default();
    let mut parser = SseEventParser::default();

    loop {
        let chunk = match tokio::time::timeout(read_timeout, stream.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => {
                tracing::warn!(url = %stream_url, error = %e, "SSE stream failed");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::warn!(url = %stream_url, "SSE stream idle past read timeout");
                break;
            }
        };

        for line in lines.push(&chunk) {
            if let Some(event) = parser.feed(&line) {
                dispatch(event, &stream_url, &inbox, &mut endpoint_tx);
            }
        }
    }

    for line in lines.finish() {
        if let Some(event) = parser.feed(&line) {
            dispatch(event, &stream_url, &inbox, &mut endpoint_tx);
        }
    }

    tracing::debug!(url = %stream_url, "SSE stream ended");
    inbox.close();
}

fn dispatch(
    event: SseEvent,
    stream_url: &Url,
    inbox: &Inbox,
    endpoint_tx: &mut Option<oneshot::Sender<Url>>,
) {
    match event.event.as_str() {
        "endpoint" => match stream_url.join(&event.data) {
            Ok(endpoint) => {
                if let Some(tx) = endpoint_tx.take() {
                    let _ = tx.send(endpoint);
                }
            }
            Err(e) => tracing::warn!(data = %event.data, error = %e, "Invalid SSE endpoint"),
        },
        "message" => match serde_json::from_str::<JsonRpcMessage>(&event.data) {
            Ok(message) => {
                tracing::debug!(url = %stream_url, "SSE message received");
                if inbox.push(message).is_err() {
                    tracing::debug!("Dropping SSE message after close");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring malformed SSE message"),
        },
        other => tracing::debug!(event = other, "Ignoring SSE event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_handles_partial_lines() {
        let mut buffer = SseLineBuffer::default();
        assert!(buffer.push(b"data: one").is_empty());
        assert_eq!(buffer.push(b"\r\n\r\n"), vec!["data: one"]);
        assert!(buffer.finish().is_empty());
    }

    #[test]
    fn test_parser_pairs_event_and_data() {
        let mut parser = SseEventParser::default();
        assert!(parser.feed("event: endpoint").is_none());
        assert_eq!(
            parser.feed("data: /messages?sessionId=abc"),
            Some(SseEvent {
                event: "endpoint".to_string(),
                data: "/messages?sessionId=abc".to_string(),
            })
        );
        // Unnamed events default to `message`.
        assert_eq!(parser.feed("data: {}").unwrap().event, "message");
        assert!(parser.feed(": keep-alive").is_none());
    }

    #[test]
    fn test_detects_event_stream_content_type() {
        assert!(is_event_stream_content_type("text/event-stream; charset=utf-8"));
        assert!(!is_event_stream_content_type("application/json"));
    }

    #[test]
    fn test_endpoint_resolves_relative_to_stream() {
        let inbox = Inbox::new();
        let (tx, mut rx) = oneshot::channel();
        let mut tx = Some(tx);
        let stream_url = Url::parse("https://example.com/mcp/sse").unwrap();

        dispatch(
            SseEvent {
                event: "endpoint".to_string(),
                data: "/mcp/messages?sessionId=1".to_string(),
            },
            &stream_url,
            &inbox,
            &mut tx,
        );

        assert_eq!(
            rx.try_recv().unwrap().as_str(),
            "https://example.com/mcp/messages?sessionId=1"
        );
    }

    #[tokio::test]
    async fn test_send_before_start_is_protocol_error() {
        let transport = SseTransport::new(
            reqwest::Client::new(),
            "http://localhost:1/sse",
            &HashMap::new(),
            Duration::from_secs(1),
        )
        .unwrap();
        let result = transport
            .send(JsonRpcMessage::notification("ping", None))
            .await;
        assert!(matches!(result, Err(TransportError::Protocol(_))));
    }
}
