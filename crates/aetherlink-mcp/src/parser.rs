//! Tool-call extraction from model output.
//!
//! Two notations are recognised:
//!
//! - envelope: `<tool_use><name>TOOL</name><arguments>ARGS</arguments></tool_use>`,
//!   where `TOOL` is a tool's safe id or raw name
//! - bare tag: `<SAFE_ID>ARGS</SAFE_ID>`, as produced by prompt-injected tools
//!
//! Arguments that are not JSON are kept: envelope arguments as the trimmed
//! string, bare-tag arguments wrapped as `{"input": ...}`.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;
use serde_json::{Value, json};

use aetherlink_core::{McpTool, ToolCallRequest};

static TOOL_USE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_use>.*?<name>(.*?)</name>.*?<arguments>(.*?)</arguments>.*?</tool_use>")
        .unwrap_or_else(|e| panic!("invalid regex: {e}"))
});

static TOOL_USE_STRIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_use>.*?</tool_use>").unwrap_or_else(|e| panic!("invalid regex: {e}"))
});

/// Any `<tag>...</tag>` pair. Deliberately loose: it also removes unrelated
/// markup the model emitted.
static ANY_TAG_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<[a-zA-Z0-9_-]+>.*?</[a-zA-Z0-9_-]+>")
        .unwrap_or_else(|e| panic!("invalid regex: {e}"))
});

/// Suffix counter for request ids, shared by every parse in the process.
static NEXT_CALL_INDEX: AtomicU64 = AtomicU64::new(0);

fn next_request_id(tool_name: &str) -> String {
    format!("{tool_name}-{}", NEXT_CALL_INDEX.fetch_add(1, Ordering::Relaxed))
}

/// Name a tool is addressed by in bare-tag markup.
fn tag_name(tool: &McpTool) -> &str {
    if tool.id.is_empty() { &tool.name } else { &tool.id }
}

fn bare_tag_pattern(tool: &McpTool) -> Option<Regex> {
    let name = regex::escape(tag_name(tool));
    if name.is_empty() {
        return None;
    }
    match Regex::new(&format!(r"(?s)<{name}>(.*?)</{name}>")) {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            tracing::warn!(tool = %tool.id, error = %e, "Cannot build tag pattern for tool");
            None
        }
    }
}

/// Extract pending tool calls from `text`.
///
/// Envelope calls come first in text order, followed by bare-tag calls
/// grouped by tool in catalog order. Envelope calls naming an unknown tool
/// are skipped.
pub fn parse_tool_use(text: &str, tools: &[McpTool]) -> Vec<ToolCallRequest> {
    if text.is_empty() || tools.is_empty() {
        return Vec::new();
    }

    let mut requests = Vec::new();

    for captures in TOOL_USE_BLOCK.captures_iter(text) {
        let name = captures.get(1).map_or("", |m| m.as_str()).trim();
        let raw_args = captures.get(2).map_or("", |m| m.as_str()).trim();

        let Some(tool) = tools.iter().find(|t| t.id == name || t.name == name) else {
            tracing::warn!(tool = %name, "Tool call names a tool that is not in the catalog");
            continue;
        };

        let arguments = serde_json::from_str(raw_args)
            .unwrap_or_else(|_| Value::String(raw_args.to_string()));
        requests.push(ToolCallRequest::pending(
            next_request_id(name),
            tool.clone(),
            arguments,
        ));
    }

    for tool in tools {
        let Some(pattern) = bare_tag_pattern(tool) else {
            continue;
        };
        for captures in pattern.captures_iter(text) {
            let raw_args = captures.get(1).map_or("", |m| m.as_str()).trim();
            let arguments =
                serde_json::from_str(raw_args).unwrap_or_else(|_| json!({ "input": raw_args }));
            requests.push(ToolCallRequest::pending(
                next_request_id(tag_name(tool)),
                tool.clone(),
                arguments,
            ));
        }
    }

    requests
}

/// Whether `text` contains a call in either notation.
pub fn has_tool_call_markup(text: &str, tools: &[McpTool]) -> bool {
    TOOL_USE_BLOCK.is_match(text)
        || tools
            .iter()
            .filter_map(bare_tag_pattern)
            .any(|pattern| pattern.is_match(text))
}

/// Remove tool-call markup from `text` before it is shown.
///
/// Envelope blocks are removed exactly. Bare tags are removed by dropping
/// every `<tag>...</tag>` pair, which can take unrelated markup with it.
pub fn strip_tool_call_markup(text: &str) -> String {
    let without_blocks = TOOL_USE_STRIP.replace_all(text, "");
    ANY_TAG_PAIR
        .replace_all(&without_blocks, "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aetherlink_core::ToolCallStatus;

    fn tool(id: &str, name: &str) -> McpTool {
        McpTool::new(id, name, "srv-1", "srv")
    }

    fn catalog() -> Vec<McpTool> {
        vec![tool("srv-search", "search"), tool("srv-fetch", "fetch")]
    }

    #[test]
    fn test_envelope_example() {
        let text = r#"<tool_use><name>srv-search</name><arguments>{"q":"weather"}</arguments></tool_use>"#;
        let calls = parse_tool_use(text, &catalog());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool.id, "srv-search");
        assert_eq!(calls[0].arguments, json!({"q": "weather"}));
        assert_eq!(calls[0].status, ToolCallStatus::Pending);
        assert!(calls[0].id.starts_with("srv-search-"));
    }

    #[test]
    fn test_three_blocks_keep_order() {
        let text = "first\n\
            <tool_use>\n  <name>srv-fetch</name>\n  <arguments>{\"url\":\"a\"}</arguments>\n</tool_use>\n\
            <tool_use><name>search</name><arguments>{\"q\":\"b\"}</arguments></tool_use>\n\
            then <tool_use><name>srv-search</name><arguments>{\"q\":\"c\"}</arguments></tool_use>";
        let calls = parse_tool_use(text, &catalog());
        let tools: Vec<&str> = calls.iter().map(|c| c.tool.id.as_str()).collect();
        assert_eq!(tools, ["srv-fetch", "srv-search", "srv-search"]);
        assert_eq!(calls[2].arguments["q"], "c");
    }

    #[test]
    fn test_unknown_tool_skipped() {
        let text = "<tool_use><name>nope</name><arguments>{}</arguments></tool_use>\
            <tool_use><name>srv-fetch</name><arguments>{}</arguments></tool_use>";
        let calls = parse_tool_use(text, &catalog());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool.name, "fetch");
    }

    #[test]
    fn test_non_json_arguments_fall_back() {
        let text = "<tool_use><name>srv-search</name><arguments> rust news </arguments></tool_use>\
            <srv-fetch>https://x.dev</srv-fetch>";
        let calls = parse_tool_use(text, &catalog());
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].arguments, json!("rust news"));
        assert_eq!(calls[1].arguments, json!({"input": "https://x.dev"}));
    }

    #[test]
    fn test_ids_unique_across_parses() {
        let text = "<srv-search>{}</srv-search>";
        let a = parse_tool_use(text, &catalog());
        let b = parse_tool_use(text, &catalog());
        assert_ne!(a[0].id, b[0].id);
    }

    #[test]
    fn test_tool_names_are_escaped() {
        let tools = vec![tool("a.b+c", "x")];
        assert!(parse_tool_use("<aXb+c>{}</aXb+c>", &tools).is_empty());
        assert_eq!(parse_tool_use("<a.b+c>{}</a.b+c>", &tools).len(), 1);
    }

    #[test]
    fn test_has_markup() {
        let tools = catalog();
        assert!(has_tool_call_markup(
            "<tool_use><name>x</name><arguments></arguments></tool_use>",
            &tools
        ));
        assert!(has_tool_call_markup("<srv-fetch>u</srv-fetch>", &tools));
        assert!(!has_tool_call_markup("<b>bold</b>", &tools));
        assert!(!has_tool_call_markup("plain text", &[]));
    }

    #[test]
    fn test_strip_markup_is_permissive() {
        let text = "Looking it up.\n<tool_use><name>srv-search</name><arguments>{}</arguments></tool_use>\n\
            <srv-fetch>u</srv-fetch> and <b>bold</b> done";
        assert_eq!(strip_tool_call_markup(text), "Looking it up.\n\n and  done");
    }

    #[test]
    fn test_empty_inputs() {
        assert!(parse_tool_use("", &catalog()).is_empty());
        assert!(parse_tool_use("<srv-fetch>u</srv-fetch>", &[]).is_empty());
    }
}
