//! Client error types.

use thiserror::Error;

use crate::refresh::RefreshFailure;

/// Client error type.
///
/// Failures split into two families. Unrelated failures (`Http`, `Api`, ...)
/// are handed back to the caller untouched. Session failures
/// (`RefreshFailed`, `AlreadyRetried`, `MissingRefreshCredential`) end the
/// session before they reach the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    /// Login was refused or returned no usable credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The access token was rejected and a refresh is required.
    #[error("Session expired")]
    SessionExpired,

    /// The token refresh did not produce a new access token.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshFailure),

    /// A request replayed after a refresh was rejected again.
    #[error("Request rejected again after token refresh")]
    AlreadyRetried,

    /// No refresh token is stored, so the session cannot be renewed.
    #[error("No refresh token available; login required")]
    MissingRefreshCredential,
}

impl Error {
    /// Check if this error ended the session.
    ///
    /// A refresh that outlived its session is not terminal: that session is
    /// already over and a newer one may be live.
    pub fn is_terminal(&self) -> bool {
        match self {
            Error::RefreshFailed(RefreshFailure::SessionEnded) => false,
            Error::RefreshFailed(_) | Error::AlreadyRetried | Error::MissingRefreshCredential => {
                true
            }
            _ => false,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        self.is_terminal()
            || matches!(self, Error::Auth(_) | Error::SessionExpired)
            || matches!(self, Error::Api { status: 401, .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Api { status, .. } if *status >= 500)
    }

    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
