//! `@aether/sequentialthinking`: a log of numbered thoughts with revisions
//! and branches.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use aetherlink_core::CallToolResult;

use super::{BuiltinServer, THINKING_SERVER, ToolDefinition, parse_args, unknown_tool};

const TOOL_NAME: &str = "sequentialthinking";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThoughtData {
    thought: String,
    thought_number: u32,
    total_thoughts: u32,
    next_thought_needed: bool,
    #[serde(default)]
    is_revision: bool,
    #[serde(default)]
    revises_thought: Option<u32>,
    #[serde(default)]
    branch_from_thought: Option<u32>,
    #[serde(default)]
    branch_id: Option<String>,
    #[serde(default)]
    needs_more_thoughts: bool,
}

#[derive(Default)]
struct ThinkingState {
    history: Vec<ThoughtData>,
    branches: BTreeMap<String, Vec<ThoughtData>>,
}

#[derive(Default)]
pub struct ThinkingServer {
    state: Mutex<ThinkingState>,
}

impl ThinkingServer {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record(&self, mut data: ThoughtData) -> CallToolResult {
        if data.thought.trim().is_empty() {
            return CallToolResult::error("thought must not be empty");
        }
        if data.thought_number == 0 || data.total_thoughts == 0 {
            return CallToolResult::error("thoughtNumber and totalThoughts start at 1");
        }
        // The estimate grows when the model goes past it.
        if data.thought_number > data.total_thoughts {
            data.total_thoughts = data.thought_number;
        }

        let mut state = self.state.lock().await;
        if let (Some(_), Some(branch_id)) = (data.branch_from_thought, data.branch_id.clone()) {
            state.branches.entry(branch_id).or_default().push(data.clone());
        }
        tracing::debug!(
            thought_number = data.thought_number,
            total_thoughts = data.total_thoughts,
            is_revision = data.is_revision,
            revises = ?data.revises_thought,
            needs_more = data.needs_more_thoughts,
            "Recorded thought"
        );
        state.history.push(data.clone());

        let summary = json!({
            "thoughtNumber": data.thought_number,
            "totalThoughts": data.total_thoughts,
            "nextThoughtNeeded": data.next_thought_needed,
            "branches": state.branches.keys().collect::<Vec<_>>(),
            "thoughtHistoryLength": state.history.len(),
        });
        drop(state);
        CallToolResult::text(summary.to_string())
    }
}

#[async_trait]
impl BuiltinServer for ThinkingServer {
    fn name(&self) -> &'static str {
        THINKING_SERVER
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: TOOL_NAME,
            description: "Record one step of a structured, revisable chain of thought. \
                Call repeatedly, adjusting totalThoughts as understanding improves, \
                revising or branching from earlier thoughts when needed, until \
                nextThoughtNeeded is false.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "thought": { "type": "string", "description": "The current thinking step" },
                    "nextThoughtNeeded": { "type": "boolean" },
                    "thoughtNumber": { "type": "integer", "minimum": 1 },
                    "totalThoughts": { "type": "integer", "minimum": 1 },
                    "isRevision": { "type": "boolean" },
                    "revisesThought": { "type": "integer", "minimum": 1 },
                    "branchFromThought": { "type": "integer", "minimum": 1 },
                    "branchId": { "type": "string" },
                    "needsMoreThoughts": { "type": "boolean" }
                },
                "required": ["thought", "nextThoughtNeeded", "thoughtNumber", "totalThoughts"]
            }),
        }]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult {
        if name != TOOL_NAME {
            return unknown_tool(THINKING_SERVER, name);
        }
        match parse_args::<ThoughtData>(name, arguments) {
            Ok(data) => self.record(data).await,
            Err(result) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(result: &CallToolResult) -> Value {
        serde_json::from_str(&result.joined_text()).unwrap()
    }

    #[tokio::test]
    async fn test_records_thoughts_and_branches() {
        let server = ThinkingServer::new();
        let first = server
            .call_tool(
                TOOL_NAME,
                json!({"thought": "a", "thoughtNumber": 1, "totalThoughts": 2, "nextThoughtNeeded": true}),
            )
            .await;
        assert!(!first.is_error);

        let second = server
            .call_tool(
                TOOL_NAME,
                json!({
                    "thought": "b", "thoughtNumber": 3, "totalThoughts": 2,
                    "nextThoughtNeeded": false, "branchFromThought": 1, "branchId": "alt"
                }),
            )
            .await;
        let body = summary(&second);
        assert_eq!(body["totalThoughts"], 3);
        assert_eq!(body["thoughtHistoryLength"], 2);
        assert_eq!(body["branches"], json!(["alt"]));
    }

    #[tokio::test]
    async fn test_missing_fields_is_error_result() {
        let server = ThinkingServer::new();
        let result = server.call_tool(TOOL_NAME, json!({"thought": "a"})).await;
        assert!(result.is_error);
    }
}
