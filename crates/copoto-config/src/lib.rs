//! Client configuration for Copoto.
//!
//! Kubeconfig-style YAML with named connection contexts:
//! - `current-context` selects the default server
//! - each context carries a server URL and optional timeout
//! - files live under `$COPOTO_CONFIG_DIR` or the XDG config directory

pub mod client;
pub mod error;
pub mod paths;

pub use client::{
    ClientConfig, ClientDefaults, Context, DEFAULT_SERVER, load_client_config,
    load_client_config_from, save_client_config, save_client_config_to,
};
pub use error::{ConfigError, Result};
pub use paths::{client_config_path, credentials_path, log_dir, xdg_config_dir};
