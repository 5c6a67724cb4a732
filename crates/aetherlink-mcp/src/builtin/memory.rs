//! `@aether/memory`: a knowledge graph of entities, observations and
//! relations, optionally persisted to a JSON file.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use aetherlink_core::CallToolResult;

use super::{BuiltinServer, MEMORY_SERVER, ToolDefinition, parse_args, unknown_tool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub observations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl KnowledgeGraph {
    fn has_entity(&self, name: &str) -> bool {
        self.entities.iter().any(|e| e.name == name)
    }

    /// Entities whose name, type or observations contain `query`
    /// (case-insensitive), plus the relations between them.
    fn search(&self, query: &str) -> Self {
        let needle = query.to_lowercase();
        let entities: Vec<Entity> = self
            .entities
            .iter()
            .filter(|e| {
                e.name.to_lowercase().contains(&needle)
                    || e.entity_type.to_lowercase().contains(&needle)
                    || e.observations
                        .iter()
                        .any(|o| o.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        let relations = self
            .relations
            .iter()
            .filter(|r| {
                entities.iter().any(|e| e.name == r.from) && entities.iter().any(|e| e.name == r.to)
            })
            .cloned()
            .collect();
        Self {
            entities,
            relations,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateEntitiesArgs {
    entities: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
struct CreateRelationsArgs {
    relations: Vec<Relation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationInput {
    entity_name: String,
    contents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AddObservationsArgs {
    observations: Vec<ObservationInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteEntitiesArgs {
    entity_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

struct MemoryState {
    graph: KnowledgeGraph,
    loaded: bool,
}

pub struct MemoryServer {
    file_path: Option<PathBuf>,
    state: Mutex<MemoryState>,
}

impl MemoryServer {
    /// Without a file path the graph lives only as long as the server.
    pub fn new(file_path: Option<PathBuf>) -> Self {
        Self {
            file_path,
            state: Mutex::new(MemoryState {
                graph: KnowledgeGraph::default(),
                loaded: false,
            }),
        }
    }

    async fn load_if_needed(&self, state: &mut MemoryState) -> Result<(), String> {
        if state.loaded {
            return Ok(());
        }
        if let Some(path) = &self.file_path {
            match tokio::fs::read_to_string(path).await {
                Ok(raw) if raw.trim().is_empty() => {}
                Ok(raw) => {
                    state.graph = serde_json::from_str(&raw).map_err(|e| {
                        format!("memory file {} is not a valid graph: {e}", path.display())
                    })?;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
            }
        }
        state.loaded = true;
        Ok(())
    }

    async fn persist(&self, graph: &KnowledgeGraph) -> Result<(), String> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(graph).map_err(|e| e.to_string())?;
        tokio::fs::write(path, raw)
            .await
            .map_err(|e| format!("failed to write {}: {e}", path.display()))
    }

    /// Run `op` against the loaded graph, persisting when it reports a change.
    async fn with_graph<F>(&self, op: F) -> CallToolResult
    where
        F: FnOnce(&mut KnowledgeGraph) -> (Value, bool) + Send,
    {
        let mut state = self.state.lock().await;
        if let Err(message) = self.load_if_needed(&mut state).await {
            return CallToolResult::error(message);
        }
        let (output, changed) = op(&mut state.graph);
        if changed {
            if let Err(message) = self.persist(&state.graph).await {
                return CallToolResult::error(message);
            }
        }
        drop(state);
        CallToolResult::text(pretty(&output))
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn create_entities(graph: &mut KnowledgeGraph, args: CreateEntitiesArgs) -> (Value, bool) {
    let mut created = Vec::new();
    for entity in args.entities {
        if !graph.has_entity(&entity.name) && !created.iter().any(|e: &Entity| e.name == entity.name)
        {
            created.push(entity);
        }
    }
    graph.entities.extend(created.iter().cloned());
    let changed = !created.is_empty();
    (json!(created), changed)
}

fn create_relations(graph: &mut KnowledgeGraph, args: CreateRelationsArgs) -> (Value, bool) {
    let mut created = Vec::new();
    for relation in args.relations {
        if !graph.relations.contains(&relation) && !created.contains(&relation) {
            created.push(relation);
        }
    }
    graph.relations.extend(created.iter().cloned());
    let changed = !created.is_empty();
    (json!(created), changed)
}

fn add_observations(
    graph: &mut KnowledgeGraph,
    args: AddObservationsArgs,
) -> Result<(Value, bool), String> {
    if let Some(missing) = args
        .observations
        .iter()
        .find(|o| !graph.has_entity(&o.entity_name))
    {
        return Err(format!("entity '{}' not found", missing.entity_name));
    }

    let mut added = Vec::new();
    for input in args.observations {
        let Some(entity) = graph.entities.iter_mut().find(|e| e.name == input.entity_name) else {
            continue;
        };
        let mut new_contents = Vec::new();
        for content in input.contents {
            if !entity.observations.contains(&content) {
                entity.observations.push(content.clone());
                new_contents.push(content);
            }
        }
        added.push(json!({ "entityName": input.entity_name, "addedObservations": new_contents }));
    }
    Ok((json!(added), true))
}

fn delete_entities(graph: &mut KnowledgeGraph, args: &DeleteEntitiesArgs) -> (Value, bool) {
    let before = graph.entities.len();
    graph
        .entities
        .retain(|e| !args.entity_names.contains(&e.name));
    graph.relations.retain(|r| {
        !args.entity_names.contains(&r.from) && !args.entity_names.contains(&r.to)
    });
    let removed = before - graph.entities.len();
    (json!({ "deleted": removed }), removed > 0)
}

fn array_schema(key: &str, items: &Value) -> Value {
    json!({
        "type": "object",
        "properties": { key: { "type": "array", "items": items } },
        "required": [key]
    })
}

#[async_trait]
impl BuiltinServer for MemoryServer {
    fn name(&self) -> &'static str {
        MEMORY_SERVER
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        let entity = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "entityType": { "type": "string" },
                "observations": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["name", "entityType", "observations"]
        });
        let relation = json!({
            "type": "object",
            "properties": {
                "from": { "type": "string" },
                "to": { "type": "string" },
                "relationType": { "type": "string", "description": "In active voice" }
            },
            "required": ["from", "to", "relationType"]
        });
        let observation = json!({
            "type": "object",
            "properties": {
                "entityName": { "type": "string" },
                "contents": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["entityName", "contents"]
        });

        vec![
            ToolDefinition {
                name: "create_entities",
                description: "Create new entities in the knowledge graph. Existing names are skipped.",
                input_schema: array_schema("entities", &entity),
            },
            ToolDefinition {
                name: "create_relations",
                description: "Create relations between entities.",
                input_schema: array_schema("relations", &relation),
            },
            ToolDefinition {
                name: "add_observations",
                description: "Add observations to existing entities.",
                input_schema: array_schema("observations", &observation),
            },
            ToolDefinition {
                name: "delete_entities",
                description: "Delete entities and every relation that touches them.",
                input_schema: array_schema("entityNames", &json!({ "type": "string" })),
            },
            ToolDefinition {
                name: "read_graph",
                description: "Read the entire knowledge graph.",
                input_schema: json!({ "type": "object", "properties": {} }),
            },
            ToolDefinition {
                name: "search_nodes",
                description: "Search entities by name, type or observation text.",
                input_schema: json!({
                    "type": "object",
                    "properties": { "query": { "type": "string" } },
                    "required": ["query"]
                }),
            },
        ]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult {
        match name {
            "create_entities" => match parse_args(name, arguments) {
                Ok(args) => self.with_graph(|g| create_entities(g, args)).await,
                Err(result) => result,
            },
            "create_relations" => match parse_args(name, arguments) {
                Ok(args) => self.with_graph(|g| create_relations(g, args)).await,
                Err(result) => result,
            },
            "add_observations" => match parse_args::<AddObservationsArgs>(name, arguments) {
                Ok(args) => {
                    let mut failure = None;
                    let result = self
                        .with_graph(|g| match add_observations(g, args) {
                            Ok(outcome) => outcome,
                            Err(message) => {
                                failure = Some(message);
                                (Value::Null, false)
                            }
                        })
                        .await;
                    failure.map_or(result, CallToolResult::error)
                }
                Err(result) => result,
            },
            "delete_entities" => match parse_args(name, arguments) {
                Ok(args) => self.with_graph(|g| delete_entities(g, &args)).await,
                Err(result) => result,
            },
            "read_graph" => self.with_graph(|g| (json!(g), false)).await,
            "search_nodes" => match parse_args::<SearchArgs>(name, arguments) {
                Ok(args) => self.with_graph(|g| (json!(g.search(&args.query)), false)).await,
                Err(result) => result,
            },
            other => unknown_tool(MEMORY_SERVER, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(result: &CallToolResult) -> KnowledgeGraph {
        serde_json::from_str(&result.joined_text()).unwrap()
    }

    async fn seed(server: &MemoryServer) {
        server
            .call_tool(
                "create_entities",
                json!({"entities": [
                    {"name": "Ada", "entityType": "person", "observations": ["likes tea"]},
                    {"name": "Rust", "entityType": "language", "observations": []}
                ]}),
            )
            .await;
        server
            .call_tool(
                "create_relations",
                json!({"relations": [{"from": "Ada", "to": "Rust", "relationType": "writes"}]}),
            )
            .await;
    }

    #[tokio::test]
    async fn test_create_and_search() {
        let server = MemoryServer::new(None);
        seed(&server).await;

        let duplicate = server
            .call_tool(
                "create_entities",
                json!({"entities": [{"name": "Ada", "entityType": "person", "observations": []}]}),
            )
            .await;
        assert_eq!(duplicate.joined_text(), "[]");

        let found = graph_of(&server.call_tool("search_nodes", json!({"query": "TEA"})).await);
        assert_eq!(found.entities.len(), 1);
        assert!(found.relations.is_empty());

        let both = graph_of(&server.call_tool("read_graph", json!({})).await);
        assert_eq!(both.entities.len(), 2);
        assert_eq!(both.relations.len(), 1);
    }

    #[tokio::test]
    async fn test_add_observations_requires_entity() {
        let server = MemoryServer::new(None);
        seed(&server).await;

        let missing = server
            .call_tool(
                "add_observations",
                json!({"observations": [{"entityName": "Bob", "contents": ["x"]}]}),
            )
            .await;
        assert!(missing.is_error);
        assert!(missing.joined_text().contains("'Bob' not found"));

        let ok = server
            .call_tool(
                "add_observations",
                json!({"observations": [{"entityName": "Ada", "contents": ["likes tea", "codes"]}]}),
            )
            .await;
        assert!(!ok.is_error);
        let graph = graph_of(&server.call_tool("read_graph", json!({})).await);
        assert_eq!(graph.entities[0].observations, vec!["likes tea", "codes"]);
    }

    #[tokio::test]
    async fn test_delete_removes_relations() {
        let server = MemoryServer::new(None);
        seed(&server).await;
        server
            .call_tool("delete_entities", json!({"entityNames": ["Rust"]}))
            .await;
        let graph = graph_of(&server.call_tool("read_graph", json!({})).await);
        assert_eq!(graph.entities.len(), 1);
        assert!(graph.relations.is_empty());
    }

    #[tokio::test]
    async fn test_graph_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.json");

        let server = MemoryServer::new(Some(path.clone()));
        seed(&server).await;
        assert!(path.exists());

        let reopened = MemoryServer::new(Some(path));
        let graph = graph_of(&reopened.call_tool("read_graph", json!({})).await);
        assert_eq!(graph.entities.len(), 2);
        assert_eq!(graph.relations[0].relation_type, "writes");
    }
}
