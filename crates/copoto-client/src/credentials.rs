//! Credential storage for the current session.
//!
//! Holds the access token, refresh token and anti-forgery token. Every
//! mutation builds the complete new set and swaps it in under one write lock,
//! so a reader observes either the previous set or the next one, never a mix.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::KeyValueStore;

/// Storage key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Storage key for the anti-forgery token.
pub const CSRF_TOKEN_KEY: &str = "csrf";

// ============================================================================
// CredentialSet
// ============================================================================

/// The credentials of one session. All values are opaque.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub anti_forgery_token: Option<String>,
}

impl CredentialSet {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            anti_forgery_token: None,
        }
    }

    pub fn with_anti_forgery_token(mut self, token: impl Into<String>) -> Self {
        self.anti_forgery_token = Some(token.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
            && self.refresh_token.is_none()
            && self.anti_forgery_token.is_none()
    }

    /// Merge a partial update, keeping current values for fields it omits.
    pub fn merged(&self, update: &CredentialUpdate) -> Self {
        Self {
            access_token: update
                .access_token()
                .or(self.access_token.as_deref())
                .map(String::from),
            refresh_token: update
                .refresh_token()
                .or(self.refresh_token.as_deref())
                .map(String::from),
            anti_forgery_token: update
                .anti_forgery_token()
                .or(self.anti_forgery_token.as_deref())
                .map(String::from),
        }
    }
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() { "<redacted>" } else { "<none>" }
        }

        f.debug_struct("CredentialSet")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("anti_forgery_token", &redact(&self.anti_forgery_token))
            .finish()
    }
}

// ============================================================================
// CredentialUpdate
// ============================================================================

/// Token payload returned by the login and refresh endpoints.
///
/// Missing or empty fields leave the stored value untouched.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, rename = "csrf", skip_serializing_if = "Option::is_none")]
    pub anti_forgery_token: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl CredentialUpdate {
    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.access_token)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        non_empty(&self.refresh_token)
    }

    pub fn anti_forgery_token(&self) -> Option<&str> {
        non_empty(&self.anti_forgery_token)
    }
}

impl std::fmt::Debug for CredentialUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialUpdate")
            .field("access_token", &self.access_token().is_some())
            .field("refresh_token", &self.refresh_token().is_some())
            .field("anti_forgery_token", &self.anti_forgery_token().is_some())
            .finish()
    }
}

// ============================================================================
// CredentialStore
// ============================================================================

/// Process-wide credential holder backed by durable storage.
///
/// Reads are lock-cheap snapshots. Writes are crate-private: only login, the
/// refresh coordinator and the session terminator change credentials.
///
/// Every login and every clear starts a new session generation. A refresh
/// applies its tokens only to the generation it was started in, so a flight
/// that lands after logout cannot bring the old session back.
#[derive(Debug)]
pub struct CredentialStore {
    current: RwLock<Session>,
    storage: Arc<dyn KeyValueStore>,
}

#[derive(Debug, Default)]
struct Session {
    credentials: CredentialSet,
    generation: u64,
}

impl CredentialStore {
    /// Create a store, loading any credentials already persisted.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let credentials = CredentialSet {
            access_token: storage.get(ACCESS_TOKEN_KEY),
            refresh_token: storage.get(REFRESH_TOKEN_KEY),
            anti_forgery_token: storage.get(CSRF_TOKEN_KEY),
        };

        if credentials.access_token.is_some() {
            tracing::debug!("Loaded persisted credentials");
        }

        Self {
            current: RwLock::new(Session {
                credentials,
                generation: 0,
            }),
            storage,
        }
    }

    /// Get a consistent copy of the current credentials.
    pub fn snapshot(&self) -> CredentialSet {
        self.current.read().credentials.clone()
    }

    /// Current session generation.
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Credentials together with the generation they belong to.
    pub(crate) fn session(&self) -> (u64, CredentialSet) {
        let session = self.current.read();
        (session.generation, session.credentials.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.current.read().credentials.access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current.read().credentials.refresh_token.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().credentials.is_empty()
    }

    /// Merge a partial update into the set of session `generation`.
    ///
    /// Returns `None` without touching anything when that session has
    /// since been replaced or cleared.
    pub(crate) fn apply(
        &self,
        generation: u64,
        update: &CredentialUpdate,
    ) -> Result<Option<CredentialSet>> {
        let mut current = self.current.write();
        if current.generation != generation {
            return Ok(None);
        }

        let next = current.credentials.merged(update);
        current.credentials = next.clone();
        self.persist(&next)?;
        Ok(Some(next))
    }

    /// Start a new session with `set`, dropping fields it lacks.
    pub(crate) fn replace(&self, set: CredentialSet) -> Result<()> {
        let mut current = self.current.write();
        current.generation += 1;
        current.credentials = set;
        self.persist(&current.credentials)
    }

    /// Remove every credential, ending the session.
    pub(crate) fn clear(&self) -> Result<()> {
        let mut current = self.current.write();
        current.generation += 1;
        current.credentials = CredentialSet::default();
        self.persist(&current.credentials)
    }

    fn persist(&self, set: &CredentialSet) -> Result<()> {
        for (key, value) in [
            (ACCESS_TOKEN_KEY, &set.access_token),
            (REFRESH_TOKEN_KEY, &set.refresh_token),
            (CSRF_TOKEN_KEY, &set.anti_forgery_token),
        ] {
            match value {
                Some(v) => self.storage.set(key, v)?,
                None => self.storage.remove(key)?,
            }
        }
        Ok(())
    }
}
