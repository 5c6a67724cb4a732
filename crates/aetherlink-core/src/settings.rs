//! MCP client settings and validation.
//!
//! Settings are a pure domain type. They are persisted as one JSON document
//! in the key-value store under [`SETTINGS_STORAGE_KEY`].

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::mcp::DEFAULT_TIMEOUT_SECS;
use crate::ports::{KeyValueStore, StorageError, get_typed, set_typed};

/// Storage key for the settings document.
pub const SETTINGS_STORAGE_KEY: &str = "mcp_settings";

/// Default origin used to absolutize CORS proxy paths.
pub const DEFAULT_PROXY_ORIGIN: &str = "http://localhost:5173";

/// Upper bound accepted for `http_max_retries`.
pub const MAX_HTTP_RETRIES: u32 = 10;

/// Runtime platform the client is embedded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Native app: direct network access, no CORS restrictions.
    #[default]
    Native,
    /// Browser build: cross-origin requests go through the dev proxy.
    Web,
}

/// Settings consumed by the transport factory and the MCP service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct McpSettings {
    pub platform: Platform,

    /// Development build. Enables the CORS proxy on the web platform.
    pub dev_mode: bool,

    /// Page origin the proxy endpoint is served from.
    pub proxy_origin: String,

    /// Retries for the native streaming-HTTP transport.
    pub http_max_retries: u32,

    /// Base delay for exponential backoff, in milliseconds.
    pub http_retry_base_delay_ms: u64,

    /// Fallback per-call timeout for records that carry none.
    pub default_timeout_secs: u64,

    /// `clientInfo.name` sent during the handshake.
    pub client_name: String,

    /// `clientInfo.version` sent during the handshake.
    pub client_version: String,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            platform: Platform::Native,
            dev_mode: false,
            proxy_origin: DEFAULT_PROXY_ORIGIN.to_string(),
            http_max_retries: 3,
            http_retry_base_delay_ms: 1000,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            client_name: "AetherLink Mobile".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Default timeout must be at least 1 second")]
    ZeroTimeout,

    #[error("HTTP retries must be at most {MAX_HTTP_RETRIES}, got {0}")]
    TooManyRetries(u32),

    #[error("Proxy origin must be an absolute http(s) URL, got '{0}'")]
    InvalidProxyOrigin(String),
}

impl McpSettings {
    /// Validate settings values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.default_timeout_secs == 0 {
            return Err(SettingsError::ZeroTimeout);
        }

        if self.http_max_retries > MAX_HTTP_RETRIES {
            return Err(SettingsError::TooManyRetries(self.http_max_retries));
        }

        let origin_ok = Url::parse(&self.proxy_origin)
            .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host());
        if !origin_ok {
            return Err(SettingsError::InvalidProxyOrigin(self.proxy_origin.clone()));
        }

        Ok(())
    }

    /// Whether requests must be rewritten through the CORS proxy.
    pub const fn uses_cors_proxy(&self) -> bool {
        matches!(self.platform, Platform::Web) && self.dev_mode
    }

    /// Load settings from the store, falling back to defaults.
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StorageError> {
        Ok(get_typed(store, SETTINGS_STORAGE_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Persist settings to the store.
    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        set_typed(store, SETTINGS_STORAGE_KEY, self).await
    }
}
