//! CORS proxy rewriting for web development builds.
//!
//! The dev server exposes `GET /api/cors-proxy?url=<encoded>` on the page
//! origin. ModelScope endpoints have a dedicated `/api/mcp` route.

use url::Url;

const CORS_PROXY_PATH: &str = "/api/cors-proxy";
const MODELSCOPE_ORIGIN: &str = "https://mcp.api-inference.modelscope.cn";
const MODELSCOPE_PROXY_PATH: &str = "/api/mcp";

/// Framing the proxy should force on the upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Sse,
    Http,
}

impl ProxyKind {
    const fn flag(self) -> &'static str {
        match self {
            Self::Sse => "force_sse=true",
            Self::Http => "force_http=true",
        }
    }
}

/// Whether `url` points at a remote host that the browser cannot reach
/// directly. Local and LAN addresses are never proxied.
pub fn needs_proxy(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    !(host == "localhost" || host == "127.0.0.1" || host.starts_with("192.168."))
}

/// Rewrite `original` to go through the proxy served from `origin`.
///
/// URLs that do not need the proxy are returned unchanged.
pub fn proxy_url(original: &str, origin: &str, kind: ProxyKind) -> String {
    if !needs_proxy(original) {
        return original.to_string();
    }

    let path = original.strip_prefix(MODELSCOPE_ORIGIN).map_or_else(
        || format!("{CORS_PROXY_PATH}?url={}", urlencoding::encode(original)),
        |rest| format!("{MODELSCOPE_PROXY_PATH}{rest}"),
    );

    let separator = if path.contains('?') { '&' } else { '?' };
    let rewritten = format!(
        "{}{path}{separator}{}",
        origin.trim_end_matches('/'),
        kind.flag()
    );

    tracing::debug!(from = %original, to = %rewritten, "Rewrote MCP URL through CORS proxy");
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://localhost:5173";

    #[test]
    fn test_local_addresses_are_not_proxied() {
        assert!(!needs_proxy("http://localhost:3000/sse"));
        assert!(!needs_proxy("http://127.0.0.1:8080/mcp"));
        assert!(!needs_proxy("http://192.168.1.20/mcp"));
        assert!(!needs_proxy("not a url"));
        assert!(needs_proxy("https://example.com/sse"));
    }

    #[test]
    fn test_sse_rewrite() {
        assert_eq!(
            proxy_url("https://example.com/sse?k=1", ORIGIN, ProxyKind::Sse),
            "http://localhost:5173/api/cors-proxy?url=https%3A%2F%2Fexample.com%2Fsse%3Fk%3D1&force_sse=true"
        );
    }

    #[test]
    fn test_modelscope_rewrite() {
        assert_eq!(
            proxy_url(
                "https://mcp.api-inference.modelscope.cn/abc/sse",
                ORIGIN,
                ProxyKind::Http
            ),
            "http://localhost:5173/api/mcp/abc/sse?force_http=true"
        );
    }

    #[test]
    fn test_local_url_unchanged() {
        let url = "http://localhost:3000/mcp";
        assert_eq!(proxy_url(url, ORIGIN, ProxyKind::Http), url);
    }
}
