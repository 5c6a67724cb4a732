//! Tool descriptions and results in the shapes LLM APIs expect.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use aetherlink_core::{CallToolResult, ContentKind, McpTool, ToolCallRequest};

/// Name a tool is exposed under to function-calling APIs.
fn function_name(tool: &McpTool) -> &str {
    if tool.id.is_empty() { &tool.name } else { &tool.id }
}

pub fn mcp_tools_to_openai_tools(tools: &[McpTool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": function_name(tool),
                    "description": tool.description,
                    "parameters": tool.input_schema,
                }
            })
        })
        .collect()
}

pub fn mcp_tools_to_anthropic_tools(tools: &[McpTool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": function_name(tool),
                "description": tool.description,
                "input_schema": tool.input_schema,
            })
        })
        .collect()
}

pub fn mcp_tools_to_gemini_tools(tools: &[McpTool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "functionDeclarations": [{
                    "name": function_name(tool),
                    "description": tool.description,
                    "parameters": tool.input_schema,
                }]
            })
        })
        .collect()
}

/// System prompt section teaching a model without native function calling
/// to emit `<tool_use>` blocks. Empty when there are no tools.
pub fn mcp_system_prompt(tools: &[McpTool]) -> String {
    if tools.is_empty() {
        return String::new();
    }

    let mut prompt = String::from("\n\n# MCP Tools\n\n");
    prompt.push_str("You can use the following tools to help the user. To use a tool, reply with this XML format:\n\n");
    prompt.push_str(
        "<tool_use>\n  <name>tool name</name>\n  <arguments>{\"param\": \"value\"}</arguments>\n</tool_use>\n\n",
    );
    prompt.push_str("## Available tools\n\n");

    for tool in tools {
        let _ = writeln!(prompt, "### {}", tool.name);
        if let Some(description) = &tool.description {
            let _ = writeln!(prompt, "{description}");
        }
        let schema = serde_json::to_string_pretty(&tool.input_schema)
            .unwrap_or_else(|_| tool.input_schema.to_string());
        let _ = writeln!(prompt, "Arguments: {schema}");
        let _ = writeln!(prompt, "Server: {}\n", tool.server_name);
    }

    prompt.push_str("Choose the tools that fit the user's request.\n");
    prompt
}

/// One part of a multi-part chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text { text: String },
    Image { image_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<MessagePart>),
}

/// Chat message carrying a tool result back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Turn a finished call into a user-role message for the next model turn.
///
/// Errors become plain text. Successes get a header line, then one part per
/// content item.
pub fn tool_call_response_to_message(request: &ToolCallRequest, result: &CallToolResult) -> ChatMessage {
    let content = if result.is_error {
        MessageContent::Text(result.joined_text())
    } else {
        let mut parts = vec![MessagePart::Text {
            text: format!("Result of MCP tool `{}`:", request.tool.name),
        }];
        for item in &result.content {
            match item.kind {
                ContentKind::Text => parts.push(MessagePart::Text {
                    text: item.text.clone().unwrap_or_else(|| "(no content)".to_string()),
                }),
                ContentKind::Image => {
                    if let Some(data) = &item.data {
                        let mime = item.mime_type.as_deref().unwrap_or("image/png");
                        parts.push(MessagePart::Image {
                            image_url: format!("data:{mime};base64,{data}"),
                        });
                    }
                }
                other => parts.push(MessagePart::Text {
                    text: format!("Unsupported content type: {}", content_kind_name(other)),
                }),
            }
        }
        MessageContent::Parts(parts)
    };

    ChatMessage {
        role: "user".to_string(),
        content,
    }
}

fn content_kind_name(kind: ContentKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(ToString::to_string))
        .unwrap_or_else(|| format!("{kind:?}"))
}
