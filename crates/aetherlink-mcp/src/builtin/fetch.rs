//! `@aether/fetch`: GET a URL and return the body as text.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use aetherlink_core::CallToolResult;

use super::{BuiltinServer, FETCH_SERVER, ToolDefinition, parse_args, unknown_tool};
use crate::transport::USER_AGENT;

const TOOL_NAME: &str = "fetch";
const DEFAULT_MAX_LENGTH: usize = 5000;

const fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

#[derive(Debug, Deserialize)]
struct FetchArgs {
    url: String,
    #[serde(default = "default_max_length")]
    max_length: usize,
    #[serde(default)]
    start_index: usize,
}

pub struct FetchServer {
    http: reqwest::Client,
}

impl FetchServer {
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch(&self, args: FetchArgs) -> CallToolResult {
        let url = match Url::parse(&args.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                return CallToolResult::error(format!("unsupported URL scheme: {}", url.scheme()));
            }
            Err(e) => return CallToolResult::error(format!("invalid URL '{}': {e}", args.url)),
        };

        let response = match self
            .http
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return CallToolResult::error(format!("failed to fetch {url}: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            return CallToolResult::error(format!("failed to fetch {url}: HTTP {status}"));
        }

        match response.text().await {
            Ok(body) => CallToolResult::text(format_page(
                url.as_str(),
                &body,
                args.start_index,
                args.max_length,
            )),
            Err(e) => CallToolResult::error(format!("failed to read body of {url}: {e}")),
        }
    }
}

/// Slice `body` by characters and note where the next chunk starts.
fn format_page(url: &str, body: &str, start_index: usize, max_length: usize) -> String {
    let total = body.chars().count();
    if start_index >= total {
        return format!("Contents of {url}:\n<no more content>");
    }

    let chunk: String = body.chars().skip(start_index).take(max_length).collect();
    let end = start_index + chunk.chars().count();
    let mut out = format!("Contents of {url}:\n{chunk}");
    if end < total {
        out.push_str(&format!(
            "\n\n<content truncated; call fetch with start_index={end} for more>"
        ));
    }
    out
}

#[async_trait]
impl BuiltinServer for FetchServer {
    fn name(&self) -> &'static str {
        FETCH_SERVER
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: TOOL_NAME,
            description: "Fetch a URL from the internet and return its contents as text.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "URL to fetch" },
                    "max_length": {
                        "type": "integer",
                        "description": "Maximum number of characters to return",
                        "default": DEFAULT_MAX_LENGTH
                    },
                    "start_index": {
                        "type": "integer",
                        "description": "Character offset to start from",
                        "default": 0
                    }
                },
                "required": ["url"]
            }),
        }]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult {
        if name != TOOL_NAME {
            return unknown_tool(FETCH_SERVER, name);
        }
        match parse_args::<FetchArgs>(name, arguments) {
            Ok(args) => self.fetch(args).await,
            Err(result) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_page_truncates_by_chars() {
        let page = format_page("https://x.dev", "héllo world", 0, 5);
        assert!(page.starts_with("Contents of https://x.dev:\nhéllo"));
        assert!(page.contains("start_index=5"));

        let rest = format_page("https://x.dev", "héllo world", 5, 100);
        assert!(rest.ends_with(" world"));
        assert!(!rest.contains("truncated"));
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let server = FetchServer::new(reqwest::Client::new());
        let result = server
            .call_tool(TOOL_NAME, json!({"url": "file:///etc/passwd"}))
            .await;
        assert!(result.is_error);
        assert!(result.joined_text().contains("unsupported URL scheme"));
    }
}
