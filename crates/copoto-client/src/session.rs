//! Session termination and post-login resumption.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;

/// Storage key for the location to return to after re-authentication.
pub const AFTER_LOGIN_KEY: &str = "afterLogin";

/// Navigation facility of the embedding application.
pub trait Navigator: Send + Sync + std::fmt::Debug {
    /// Where the user currently is, if known.
    fn current_location(&self) -> Option<String>;

    /// Send the user to the login entry point.
    fn to_login(&self);

    /// Send the user to a previously recorded location.
    fn to_location(&self, location: &str);
}

/// Navigator that only tracks a location and reports transitions via tracing.
#[derive(Debug, Default)]
pub struct LoggingNavigator {
    location: Mutex<Option<String>>,
}

impl LoggingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the location the user is at.
    pub fn set_location(&self, location: impl Into<String>) {
        *self.location.lock() = Some(location.into());
    }
}

impl Navigator for LoggingNavigator {
    fn current_location(&self) -> Option<String> {
        self.location.lock().clone()
    }

    fn to_login(&self) {
        tracing::warn!("Session ended, login required");
    }

    fn to_location(&self, location: &str) {
        tracing::info!(location, "Resuming at previous location");
        self.set_location(location);
    }
}

/// Ends a session that cannot be recovered.
///
/// Termination clears credentials, records where the user was, and sends
/// them to login. Concurrent and repeated calls collapse into one until the
/// terminator is re-armed by a new login.
#[derive(Debug)]
pub struct SessionTerminator {
    credentials: Arc<CredentialStore>,
    storage: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
    terminated: AtomicBool,
}

impl SessionTerminator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        storage: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            credentials,
            storage,
            navigator,
            terminated: AtomicBool::new(false),
        }
    }

    /// Terminate the session because of `cause`.
    ///
    /// Returns `false` when the session was already terminated.
    pub fn terminate(&self, cause: &Error) -> bool {
        if self.terminated.swap(true, Ordering::SeqCst) {
            tracing::debug!(%cause, "Session already terminated");
            return false;
        }

        tracing::warn!(%cause, "Terminating session");

        if let Err(e) = self.credentials.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted credentials");
        }

        if let Some(location) = self.navigator.current_location()
            && let Err(e) = self.storage.set(AFTER_LOGIN_KEY, &location)
        {
            tracing::warn!(error = %e, "Failed to record location before logout");
        }

        self.navigator.to_login();
        true
    }

    /// Whether the current session has been terminated.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Allow a new session to be terminated again.
    pub(crate) fn rearm(&self) {
        self.terminated.store(false, Ordering::SeqCst);
    }

    /// The location recorded by the last termination, if any.
    pub fn pending_location(&self) -> Option<String> {
        self.storage.get(AFTER_LOGIN_KEY)
    }

    /// Navigate back to the location recorded at termination.
    ///
    /// The record is consumed; a second call returns `None`.
    pub fn resume_after_login(&self) -> Result<Option<String>> {
        let Some(location) = self.storage.get(AFTER_LOGIN_KEY) else {
            return Ok(None);
        };

        self.storage.remove(AFTER_LOGIN_KEY)?;
        self.navigator.to_location(&location);
        Ok(Some(location))
    }
}
