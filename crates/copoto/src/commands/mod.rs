//! CLI command handlers.

pub mod config;
pub mod login;
pub mod logout;
pub mod request;
pub mod resume;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use copoto_client::{CopotoClient, FileStore};

use crate::navigator::TerminalNavigator;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Server URL to connect to.
    pub server_url: String,
    /// Selected context name, if any.
    pub context: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Where session credentials are persisted.
    pub fn credentials_path(&self) -> Result<PathBuf> {
        copoto_config::credentials_path()
            .ok_or_else(|| anyhow!("Could not determine config directory"))
    }

    /// Build a client backed by the persisted credentials.
    pub fn client(&self, navigator: TerminalNavigator) -> Result<CopotoClient> {
        let storage = FileStore::open(self.credentials_path()?)?;
        let client = CopotoClient::builder()
            .base_url(&self.server_url)
            .timeout(self.timeout)
            .storage(Arc::new(storage))
            .navigator(Arc::new(navigator))
            .build()?;
        Ok(client)
    }
}

/// Print a value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
