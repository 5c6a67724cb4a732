//! `run` - extract tool calls from model output and execute them.
//!
//! Prints one status line per finished call as it completes, then the
//! results in call order, then the text with the tool-call markup removed.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use aetherlink_core::{CallToolResult, ToolCallRequest};
use aetherlink_mcp::{parse_tool_use, strip_tool_call_markup};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::first_line;

pub async fn execute(ctx: &CliContext, file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(CliError::from)?;
            text
        }
    };

    let tools = ctx
        .mcp()
        .get_all_available_tools()
        .await
        .map_err(CliError::from)?;
    let requests = parse_tool_use(&text, &tools);
    if requests.is_empty() {
        tracing::info!(tools = tools.len(), "No tool calls found in input");
    }

    let report = |request: &ToolCallRequest, result: &CallToolResult| {
        println!("{}", status_line(request, result));
    };
    let results = ctx
        .mcp()
        .parse_and_call_tools(requests.clone().into(), &tools, Some(&report))
        .await;

    for (request, result) in requests.iter().zip(&results) {
        println!();
        println!("## {} ({})", request.tool.id, request.id);
        println!("{}", result.joined_text());
    }

    let stripped = strip_tool_call_markup(&text);
    if !stripped.is_empty() {
        println!();
        println!("{stripped}");
    }
    Ok(())
}

fn status_line(request: &ToolCallRequest, result: &CallToolResult) -> String {
    let status = serde_json::to_value(request.status)
        .ok()
        .and_then(|v| v.as_str().map(ToString::to_string))
        .unwrap_or_else(|| format!("{:?}", request.status));
    format!(
        "[{status}] {} ({}): {}",
        request.tool.id,
        request.id,
        first_line(&result.joined_text())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use aetherlink_core::{McpTool, ToolCallStatus};
    use serde_json::json;

    #[test]
    fn test_status_line() {
        let tool = McpTool::new("srv-search", "search", "s1", "srv");
        let mut request = ToolCallRequest::pending("srv-search-1", tool, json!({}));
        request.transition(ToolCallStatus::Invoking);
        let result = CallToolResult::error("tool call failed: search: timeout\nmore");
        request.complete(&result);

        assert_eq!(
            status_line(&request, &result),
            "[error] srv-search (srv-search-1): tool call failed: search: timeout"
        );
    }
}
