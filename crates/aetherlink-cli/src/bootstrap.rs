//! CLI bootstrap - the composition root.
//!
//! This module is the only place where infrastructure is wired together
//! for the CLI adapter: the `SQLite` store (via aetherlink-db), persisted
//! settings with command-line overrides, and the MCP service.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use aetherlink_core::paths::database_path;
use aetherlink_core::{KeyValueStore, McpSettings, NoopEmitter, Platform};
use aetherlink_db::{SqliteKeyValueStore, setup_database};
use aetherlink_mcp::McpService;

use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Database file. Defaults to the data directory.
    pub db_path: Option<PathBuf>,
    pub web: bool,
    pub dev: bool,
    pub proxy_origin: Option<String>,
}

impl CliConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            db_path: cli.db.clone(),
            web: cli.web,
            dev: cli.dev,
            proxy_origin: cli.proxy_origin.clone(),
        }
    }

    /// Layer the command-line overrides over persisted settings.
    pub fn apply(&self, settings: &mut McpSettings) {
        if self.web {
            settings.platform = Platform::Web;
        }
        if self.dev {
            settings.dev_mode = true;
        }
        if let Some(origin) = &self.proxy_origin {
            settings.proxy_origin.clone_from(origin);
        }
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub mcp: Arc<McpService>,
}

impl CliContext {
    pub const fn mcp(&self) -> &Arc<McpService> {
        &self.mcp
    }
}

/// Open the store, load settings and build the MCP service.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let db_path = match config.db_path.clone() {
        Some(path) => path,
        None => database_path()?,
    };
    let pool = setup_database(&db_path)
        .await
        .with_context(|| format!("opening database {}", db_path.display()))?;
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(pool));

    let mut settings = McpSettings::load(store.as_ref()).await?;
    config.apply(&mut settings);
    tracing::debug!(
        db = %db_path.display(),
        platform = ?settings.platform,
        dev_mode = settings.dev_mode,
        "Bootstrapping MCP service"
    );

    let mcp = McpService::from_settings(store, Arc::new(NoopEmitter), settings)?;
    Ok(CliContext { mcp: Arc::new(mcp) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aetherlink_core::McpServer;

    #[test]
    fn test_overrides_layer_over_settings() {
        let config = CliConfig {
            web: true,
            dev: true,
            proxy_origin: Some("http://localhost:3000".to_string()),
            ..CliConfig::default()
        };
        let mut settings = McpSettings::default();
        config.apply(&mut settings);
        assert!(settings.uses_cors_proxy());
        assert_eq!(settings.proxy_origin, "http://localhost:3000");

        let mut untouched = McpSettings::default();
        CliConfig::default().apply(&mut untouched);
        assert_eq!(untouched, McpSettings::default());
    }

    #[tokio::test]
    async fn test_registry_persists_in_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            db_path: Some(dir.path().join("nested").join("a.db")),
            ..CliConfig::default()
        };

        let ctx = bootstrap(config.clone()).await.unwrap();
        ctx.mcp()
            .add_server(McpServer::new_sse("s", "search", "https://example.com/sse"))
            .await
            .unwrap();
        drop(ctx);

        let ctx = bootstrap(config).await.unwrap();
        let servers = ctx.mcp().list_servers().await.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "search");
    }

    #[tokio::test]
    async fn test_invalid_proxy_origin_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            db_path: Some(dir.path().join("a.db")),
            proxy_origin: Some("not a url".to_string()),
            ..CliConfig::default()
        };
        assert!(bootstrap(config).await.is_err());
    }
}
