//! `@aether/filesystem`: file access confined to the directories given as
//! the record's `args`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use aetherlink_core::CallToolResult;

use super::{BuiltinServer, FILESYSTEM_SERVER, ToolDefinition, parse_args, unknown_tool};

#[derive(Debug, Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

pub struct FileSystemServer {
    allowed: Vec<PathBuf>,
}

impl FileSystemServer {
    /// Roots that do not exist are dropped with a warning.
    pub fn new(allowed_dirs: &[String]) -> Self {
        let allowed = allowed_dirs
            .iter()
            .filter_map(|dir| match std::fs::canonicalize(dir) {
                Ok(path) if path.is_dir() => Some(path),
                Ok(_) => {
                    tracing::warn!(dir = %dir, "Allowed path is not a directory, ignoring");
                    None
                }
                Err(e) => {
                    tracing::warn!(dir = %dir, error = %e, "Allowed directory unavailable, ignoring");
                    None
                }
            })
            .collect();
        Self { allowed }
    }

    fn is_allowed(&self, path: &Path) -> bool {
        self.allowed.iter().any(|root| path.starts_with(root))
    }

    /// Resolve an existing path and check it is inside an allowed root.
    async fn resolve_existing(&self, requested: &str) -> Result<PathBuf, String> {
        let path = tokio::fs::canonicalize(requested)
            .await
            .map_err(|e| format!("cannot access {requested}: {e}"))?;
        if self.is_allowed(&path) {
            Ok(path)
        } else {
            Err(format!("access denied: {requested} is outside the allowed directories"))
        }
    }

    /// Resolve a path that may not exist yet through its parent directory.
    async fn resolve_new(&self, requested: &str) -> Result<PathBuf, String> {
        let requested_path = Path::new(requested);
        let file_name = requested_path
            .file_name()
            .ok_or_else(|| format!("not a file path: {requested}"))?;
        let parent = match requested_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let parent = tokio::fs::canonicalize(parent)
            .await
            .map_err(|e| format!("cannot access parent of {requested}: {e}"))?;
        if !self.is_allowed(&parent) {
            return Err(format!("access denied: {requested} is outside the allowed directories"));
        }

        let path = parent.join(file_name);
        // An existing entry may be a symlink; check where it lands.
        if tokio::fs::symlink_metadata(&path).await.is_ok() {
            let target = tokio::fs::canonicalize(&path)
                .await
                .map_err(|e| format!("cannot access {requested}: {e}"))?;
            if !self.is_allowed(&target) {
                return Err(format!("access denied: {requested} is outside the allowed directories"));
            }
            return Ok(target);
        }
        Ok(path)
    }

    async fn read_file(&self, args: PathArgs) -> Result<String, String> {
        let path = self.resolve_existing(&args.path).await?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| format!("failed to read {}: {e}", path.display()))
    }

    async fn write_file(&self, args: WriteArgs) -> Result<String, String> {
        let path = self.resolve_new(&args.path).await?;
        tokio::fs::write(&path, args.content.as_bytes())
            .await
            .map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        Ok(format!("Successfully wrote to {}", path.display()))
    }

    async fn list_directory(&self, args: PathArgs) -> Result<String, String> {
        let path = self.resolve_existing(&args.path).await?;
        let mut entries = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| format!("failed to list {}: {e}", path.display()))?;

        let mut lines = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("failed to read entry: {e}"))?
        {
            let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
            let name = entry.file_name().to_string_lossy().to_string();
            lines.push((is_dir, name));
        }

        // Directories first, then files, both alphabetically.
        lines.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.to_lowercase().cmp(&b.1.to_lowercase()))
        });
        Ok(lines
            .into_iter()
            .map(|(is_dir, name)| format!("[{}] {name}", if is_dir { "DIR" } else { "FILE" }))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn list_allowed_directories(&self) -> String {
        if self.allowed.is_empty() {
            return "No directories are accessible. Pass allowed directories as args.".to_string();
        }
        let dirs = self
            .allowed
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        format!("Allowed directories:\n{dirs}")
    }
}

fn into_result(outcome: Result<String, String>) -> CallToolResult {
    match outcome {
        Ok(text) => CallToolResult::text(text),
        Err(message) => CallToolResult::error(message),
    }
}

fn path_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": { "path": { "type": "string", "description": description } },
        "required": ["path"]
    })
}

#[async_trait]
impl BuiltinServer for FileSystemServer {
    fn name(&self) -> &'static str {
        FILESYSTEM_SERVER
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "read_file",
                description: "Read the complete contents of a text file.",
                input_schema: path_schema("File to read"),
            },
            ToolDefinition {
                name: "write_file",
                description: "Create or overwrite a file with the given content.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string" },
                        "content": { "type": "string" }
                    },
                    "required": ["path", "content"]
                }),
            },
            ToolDefinition {
                name: "list_directory",
                description: "List files and directories, marked [DIR] or [FILE].",
                input_schema: path_schema("Directory to list"),
            },
            ToolDefinition {
                name: "list_allowed_directories",
                description: "List the directories this server may access.",
                input_schema: json!({ "type": "object", "properties": {} }),
            },
        ]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult {
        match name {
            "read_file" => match parse_args(name, arguments) {
                Ok(args) => into_result(self.read_file(args).await),
                Err(result) => result,
            },
            "write_file" => match parse_args(name, arguments) {
                Ok(args) => into_result(self.write_file(args).await),
                Err(result) => result,
            },
            "list_directory" => match parse_args(name, arguments) {
                Ok(args) => into_result(self.list_directory(args).await),
                Err(result) => result,
            },
            "list_allowed_directories" => CallToolResult::text(self.list_allowed_directories()),
            other => unknown_tool(FILESYSTEM_SERVER, other),
        }
    }
}
