//! Authentication API.

use crate::client::CopotoClient;
use crate::credentials::{CredentialSet, CredentialUpdate};
use crate::error::{Error, Result};
use crate::request::RequestDescriptor;
use crate::types::{ApiEnvelope, LoginRequest};

/// Authentication API client.
pub struct AuthApi {
    client: CopotoClient,
}

impl AuthApi {
    pub(crate) fn new(client: CopotoClient) -> Self {
        Self { client }
    }

    /// Log in and start a new session.
    ///
    /// Replaces any stored credentials. Login never goes through session
    /// recovery: a refused login is reported, not refreshed.
    pub async fn login(&self, id: &str, password: &str) -> Result<()> {
        let envelope: ApiEnvelope<CredentialUpdate> = self
            .client
            .post_anonymous("user/login", &LoginRequest { id, password })
            .await
            .map_err(|e| match e {
                Error::Api {
                    status: 400 | 401 | 403,
                    message,
                } => Error::Auth(message),
                other => other,
            })?;

        let update = envelope.data.unwrap_or_default();
        let Some(access_token) = update.access_token() else {
            return Err(Error::Auth(
                "login response carried no access token".to_string(),
            ));
        };

        let credentials = CredentialSet {
            access_token: Some(access_token.to_string()),
            refresh_token: update.refresh_token().map(String::from),
            anti_forgery_token: update.anti_forgery_token().map(String::from),
        };
        self.client.credentials().replace(credentials)?;
        self.client.terminator().rearm();

        tracing::info!(user = id, "Logged in");
        Ok(())
    }

    /// Log out on the server and forget local credentials.
    ///
    /// Local credentials are cleared even when the server call fails; the
    /// server's error is still returned. An expired token is not refreshed
    /// just to log out, and logging out never sends the user to login.
    pub async fn logout(&self) -> Result<()> {
        let result = self
            .client
            .execute_once(RequestDescriptor::post("user/logout"))
            .await;

        self.client.credentials().clear()?;
        tracing::info!("Logged out");

        result.map(|_| ())
    }

    /// Whether an access token is currently held.
    pub fn is_authenticated(&self) -> bool {
        self.client.credentials().access_token().is_some()
    }
}
