//! Filesystem locations.

use std::path::PathBuf;

/// Application directory name under the platform config dir.
const APP_NAME: &str = "copoto";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "COPOTO_CONFIG_DIR";

const CLIENT_CONFIG_FILE: &str = "client.yaml";
const CREDENTIALS_FILE: &str = "credentials.json";
const LOG_DIR: &str = "logs";

/// Get the Copoto config directory.
///
/// `$COPOTO_CONFIG_DIR` wins when set and non-empty.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the path to the client config file.
pub fn client_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(CLIENT_CONFIG_FILE))
}

/// Get the path to the persisted session credentials.
pub fn credentials_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(CREDENTIALS_FILE))
}

/// Get the log directory.
pub fn log_dir() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(LOG_DIR))
}
