//! Client configuration for connecting to a Copoto server.
//!
//! A kubeconfig-style file with named contexts:
//!
//! ```yaml
//! api-version: v1
//! kind: ClientConfig
//!
//! current-context: local
//!
//! contexts:
//!   - name: local
//!     server: http://localhost:8080
//!   - name: prod
//!     server: https://copoto.example.com
//!     timeout: 10
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Client Config
// ─────────────────────────────────────────────────────────────────────────────

/// API version for the client config file format.
pub const API_VERSION: &str = "v1";

/// Kind identifier for client config files.
pub const KIND: &str = "ClientConfig";

/// Server used when neither flags, environment nor config name one.
pub const DEFAULT_SERVER: &str = "http://localhost:8080";

/// Root client configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientConfig {
    /// API version (always "v1" currently).
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Config kind (always "ClientConfig").
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Name of the current/default context.
    #[serde(default)]
    pub current_context: Option<String>,

    /// Named connection contexts.
    #[serde(default)]
    pub contexts: Vec<Context>,

    /// Default settings applied to all contexts.
    #[serde(default)]
    pub defaults: ClientDefaults,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

impl ClientConfig {
    /// Create an empty client config.
    pub fn new() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            ..Default::default()
        }
    }

    /// Parse from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        serde_yaml::from_str(yaml_str).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::ParseYaml(e.to_string()))
    }

    /// Get the current context, if set and valid.
    pub fn current(&self) -> Option<&Context> {
        self.current_context
            .as_ref()
            .and_then(|name| self.get_context(name))
    }

    /// Get a context by name.
    pub fn get_context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name)
    }

    /// Add or update a context.
    pub fn set_context(&mut self, context: Context) {
        if let Some(existing) = self.contexts.iter_mut().find(|c| c.name == context.name) {
            *existing = context;
        } else {
            self.contexts.push(context);
        }
    }

    /// Remove a context by name.
    pub fn remove_context(&mut self, name: &str) -> Option<Context> {
        let pos = self.contexts.iter().position(|c| c.name == name)?;
        if self.current_context.as_deref() == Some(name) {
            self.current_context = None;
        }
        Some(self.contexts.remove(pos))
    }

    /// Set the current context by name.
    ///
    /// Returns an error if the context doesn't exist.
    pub fn use_context(&mut self, name: &str) -> Result<()> {
        if self.get_context(name).is_some() {
            self.current_context = Some(name.to_string());
            Ok(())
        } else {
            Err(ConfigError::ContextNotFound(name.to_string()))
        }
    }

    /// List all context names.
    pub fn context_names(&self) -> Vec<&str> {
        self.contexts.iter().map(|c| c.name.as_str()).collect()
    }

    /// Get the server URL of the current context.
    pub fn current_server_url(&self) -> Option<String> {
        self.current().map(|c| c.server.clone())
    }

    /// Select a context: the named one, else the current one.
    ///
    /// Naming a context that doesn't exist is an error.
    pub fn select(&self, name: Option<&str>) -> Result<Option<&Context>> {
        match name {
            Some(name) => self
                .get_context(name)
                .map(Some)
                .ok_or_else(|| ConfigError::ContextNotFound(name.to_string())),
            None => Ok(self.current()),
        }
    }

    /// Resolve the server URL to talk to.
    ///
    /// Precedence: `explicit`, then the selected context, then [`DEFAULT_SERVER`].
    pub fn resolve_server(&self, explicit: Option<&str>, context: Option<&str>) -> Result<String> {
        if let Some(server) = explicit {
            return Ok(server.to_string());
        }
        Ok(self
            .select(context)?
            .map(|c| c.server.clone())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string()))
    }

    /// Request timeout for the selected context, falling back to defaults.
    pub fn resolve_timeout(&self, context: Option<&str>) -> Result<Duration> {
        let secs = self
            .select(context)?
            .and_then(|c| c.timeout)
            .unwrap_or(self.defaults.timeout);
        Ok(Duration::from_secs(secs))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context
// ─────────────────────────────────────────────────────────────────────────────

/// A named connection context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Context {
    /// Unique name for this context.
    pub name: String,

    /// Server URL (e.g., "http://localhost:8080").
    pub server: String,

    /// Request timeout override (seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Context {
    /// Create a new context with just a name and server URL.
    pub fn new(name: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            timeout: None,
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default settings applied to all contexts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientDefaults {
    /// Default request timeout in seconds.
    pub timeout: u64,
}

impl Default for ClientDefaults {
    fn default() -> Self {
        Self { timeout: 30 }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading / Saving
// ─────────────────────────────────────────────────────────────────────────────

/// Load the client configuration.
///
/// Returns a default config if the file doesn't exist.
pub fn load_client_config() -> Result<ClientConfig> {
    load_client_config_from(crate::client_config_path().as_deref())
}

/// Load client config from a specific path.
pub fn load_client_config_from(path: Option<&Path>) -> Result<ClientConfig> {
    let Some(path) = path else {
        return Ok(ClientConfig::new());
    };

    if !path.exists() {
        return Ok(ClientConfig::new());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;

    ClientConfig::from_yaml(&contents)
}

/// Save the client configuration.
pub fn save_client_config(config: &ClientConfig) -> Result<()> {
    let path = crate::client_config_path().ok_or(ConfigError::NoConfigDir)?;
    save_client_config_to(config, &path)
}

/// Save client config to a specific path.
pub fn save_client_config_to(config: &ClientConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_yaml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
