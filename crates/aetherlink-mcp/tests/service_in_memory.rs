//! End-to-end service tests using the built-in in-process servers.

mod common;

use std::sync::Arc;

use serde_json::{Value, json};

use aetherlink_core::{McpSettings, MemoryKeyValueStore, NoopEmitter};
use aetherlink_mcp::{
    BuiltinOverrides, McpServer, McpService, MessageContent, ToolCallStatus, mcp_system_prompt,
    mcp_tools_to_openai_tools, parse_tool_use, tool_call_response_to_message,
};
use common::{fast_settings, service_with};

#[tokio::test]
async fn test_registry_survives_service_restart() {
    let store = Arc::new(MemoryKeyValueStore::new());
    let record = McpServer::new_streamable_http("docs", "docs", "https://mcp.example.com/mcp")
        .with_header("Authorization", "Bearer t")
        .with_timeout_secs(30)
        .with_description("Docs search");

    let first = McpService::from_settings(store.clone(), Arc::new(NoopEmitter), McpSettings::default())
        .unwrap();
    first.add_server(record.clone()).await.unwrap();
    drop(first);

    let second = McpService::from_settings(store, Arc::new(NoopEmitter), McpSettings::default())
        .unwrap();
    assert_eq!(second.list_servers().await.unwrap(), vec![record]);

    second.remove_server("docs").await.unwrap();
    assert!(second.list_servers().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_graph_through_tool_use_markup() {
    let dir = tempfile::tempdir().unwrap();
    let memory_file = dir.path().join("memory.json");
    let (service, emitter) = service_with(fast_settings(0));

    let server = service
        .add_builtin_server(
            "@aether/memory",
            BuiltinOverrides {
                id: Some("mem".to_string()),
                env: [(
                    "MEMORY_FILE_PATH".to_string(),
                    memory_file.display().to_string(),
                )]
                .into(),
                ..BuiltinOverrides::default()
            },
        )
        .await
        .unwrap();
    assert!(server.is_active);

    let tools = service.get_all_available_tools().await.unwrap();
    assert!(tools.iter().any(|t| t.id == "tool_aether-read_graph"));
    assert_eq!(mcp_tools_to_openai_tools(&tools).len(), tools.len());
    assert!(mcp_system_prompt(&tools).contains("### create_entities"));

    let create = r#"I'll remember that.
<tool_use>
  <name>tool_aether-create_entities</name>
  <arguments>{"entities":[{"name":"Ada","entityType":"person","observations":["likes tea"]}]}</arguments>
</tool_use>"#;
    let results = service.parse_and_call_tools(create.into(), &tools, None).await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].is_error, "{}", results[0].joined_text());
    assert!(memory_file.exists());

    let read = "<tool_use><name>tool_aether-read_graph</name><arguments>{}</arguments></tool_use>";
    let requests = parse_tool_use(read, &tools);
    let results = service
        .parse_and_call_tools(requests.clone().into(), &tools, None)
        .await;
    let graph: Value = serde_json::from_str(&results[0].joined_text()).unwrap();
    assert_eq!(graph["entities"][0]["name"], "Ada");

    let message = tool_call_response_to_message(&requests[0], &results[0]);
    assert_eq!(message.role, "user");
    assert!(matches!(message.content, MessageContent::Parts(ref parts) if parts.len() == 2));

    let names = emitter.names();
    assert_eq!(names.iter().filter(|n| **n == "mcp:tool_call").count(), 2);
}

#[tokio::test]
async fn test_inactive_servers_are_not_discovered() {
    let (service, _) = service_with(fast_settings(0));
    service
        .add_builtin_server(
            "@aether/sequentialthinking",
            BuiltinOverrides {
                id: Some("think".to_string()),
                is_active: Some(false),
                ..BuiltinOverrides::default()
            },
        )
        .await
        .unwrap();
    assert!(service.get_all_available_tools().await.unwrap().is_empty());

    service.toggle_server("think", true).await.unwrap();
    let tools = service.get_all_available_tools().await.unwrap();
    assert_eq!(tools[0].id, "tool_aether-sequentialthinking");

    service.toggle_server("think", false).await.unwrap();
    assert!(service.get_all_available_tools().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_builtin_toggle_rolls_back() {
    let (service, emitter) = service_with(fast_settings(0));
    service
        .add_server(McpServer::new_in_memory("odd", "@aether/unknown"))
        .await
        .unwrap();

    assert!(service.toggle_server("odd", true).await.is_err());
    assert!(!service.get_server("odd").await.unwrap().is_active);
    assert_eq!(emitter.names().last(), Some(&"mcp:error"));
}

#[tokio::test]
async fn test_unknown_tool_name_in_markup_is_ignored() {
    let (service, _) = service_with(fast_settings(0));
    service
        .add_builtin_server("@aether/sequentialthinking", BuiltinOverrides::default())
        .await
        .unwrap();
    let tools = service.get_all_available_tools().await.unwrap();

    let text = "<tool_use><name>nope</name><arguments>{}</arguments></tool_use>";
    assert!(parse_tool_use(text, &tools).is_empty());

    let calls = parse_tool_use(
        "<tool_use><name>sequentialthinking</name><arguments>{\"thought\":\"a\",\"nextThoughtNeeded\":false,\"thoughtNumber\":1,\"totalThoughts\":1}</arguments></tool_use>",
        &tools,
    );
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, ToolCallStatus::Pending);
    assert_eq!(calls[0].arguments["thoughtNumber"], json!(1));
}
