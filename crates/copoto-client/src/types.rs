//! Request and response types for the Copoto API.
//!
//! These types mirror the server's API contract.

use serde::{Deserialize, Serialize};

/// Envelope wrapping every server response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// HTTP status echoed by the server.
    #[serde(default)]
    pub status: Option<u16>,
    /// Human-readable result message.
    #[serde(default)]
    pub message: Option<String>,
    /// Payload.
    pub data: Option<T>,
}

/// Login request body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub id: &'a str,
    pub password: &'a str,
}

/// Refresh request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}
