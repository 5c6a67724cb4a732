//! Tool invocation types: result envelopes and in-flight call records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::McpTool;

/// Kind of a content item in a tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Image,
    Audio,
    Resource,
    ResourceLink,
    #[serde(other)]
    Unsupported,
}

/// Resource embedded in a `resource` content item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// One item of a tool result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: ContentKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Base64 payload for image/audio items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<EmbeddedResource>,
}

impl ToolContent {
    /// Create a text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            text: Some(text.into()),
            data: None,
            mime_type: None,
            resource: None,
        }
    }

    /// Create an image item from base64 data.
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Image,
            text: None,
            data: Some(data.into()),
            mime_type: Some(mime_type.into()),
            resource: None,
        }
    }
}

/// Uniform envelope for the outcome of a tool call.
///
/// `is_error = true` always comes with at least one text item describing the
/// failure; use [`CallToolResult::normalized`] on anything read off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,

    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Successful result with a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
            is_error: false,
        }
    }

    /// Successful result with arbitrary content.
    pub const fn success(content: Vec<ToolContent>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// Error result with a single text item.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(message)],
            is_error: true,
        }
    }

    /// Enforce the error-has-text invariant.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.is_error && !self.content.iter().any(|c| c.kind == ContentKind::Text) {
            self.content
                .push(ToolContent::text("tool reported an error without details"));
        }
        self
    }

    /// Concatenate all text items, newline separated.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Lifecycle state of an extracted tool call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    #[default]
    Pending,
    Invoking,
    Done,
    Error,
}

impl ToolCallStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// pending -> invoking -> {done | error}. A pending call may also fail
    /// directly when it never reaches its server.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Invoking | Self::Error)
                | (Self::Invoking, Self::Done | Self::Error)
        )
    }
}

/// A tool call extracted from LLM output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    /// Unique id of this call.
    pub id: String,

    /// The resolved tool.
    pub tool: McpTool,

    /// Parsed JSON arguments, or a JSON string when parsing failed.
    pub arguments: Value,

    pub status: ToolCallStatus,

    /// Final result, set once the call reaches a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<CallToolResult>,
}

impl ToolCallRequest {
    /// Create a pending call.
    pub fn pending(id: impl Into<String>, tool: McpTool, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool,
            arguments,
            status: ToolCallStatus::Pending,
            response: None,
        }
    }

    /// Move to `next`, returning whether the transition was legal.
    ///
    /// Illegal transitions leave the record untouched.
    pub fn transition(&mut self, next: ToolCallStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Record the final result and move to `done` or `error` accordingly.
    pub fn complete(&mut self, result: &CallToolResult) -> bool {
        let next = if result.is_error {
            ToolCallStatus::Error
        } else {
            ToolCallStatus::Done
        };
        let moved = self.transition(next);
        if moved {
            self.response = Some(result.clone());
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tool() -> McpTool {
        McpTool::new("srv-search", "search", "srv", "srv")
    }

    #[test]
    fn test_status_machine() {
        let mut call = ToolCallRequest::pending("search-0", sample_tool(), json!({}));
        assert!(!call.transition(ToolCallStatus::Done));
        assert!(call.transition(ToolCallStatus::Invoking));
        assert!(call.complete(&CallToolResult::text("ok")));
        assert_eq!(call.status, ToolCallStatus::Done);

        // Terminal states are final.
        assert!(!call.transition(ToolCallStatus::Invoking));
        assert!(!call.complete(&CallToolResult::error("late")));
        assert_eq!(call.status, ToolCallStatus::Done);
    }

    #[test]
    fn test_error_result_marks_error_status() {
        let mut call = ToolCallRequest::pending("search-0", sample_tool(), json!({}));
        call.transition(ToolCallStatus::Invoking);
        call.complete(&CallToolResult::error("boom"));
        assert_eq!(call.status, ToolCallStatus::Error);
        assert!(call.response.as_ref().is_some_and(|r| r.is_error));
    }

    #[test]
    fn test_parse_wire_result() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "hello"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "resource", "resource": {"uri": "file:///a", "text": "x"}},
                {"type": "hologram"}
            ],
            "isError": false
        }))
        .unwrap();

        assert_eq!(result.content.len(), 4);
        assert_eq!(result.content[1].mime_type.as_deref(), Some("image/png"));
        assert_eq!(result.content[3].kind, ContentKind::Unsupported);
        assert_eq!(result.joined_text(), "hello");
    }

    #[test]
    fn test_normalized_error_has_text() {
        let result = CallToolResult {
            content: vec![ToolContent::image("aGk=", "image/png")],
            is_error: true,
        }
        .normalized();
        assert!(result.content.iter().any(|c| c.kind == ContentKind::Text));
    }
}
