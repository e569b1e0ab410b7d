//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use copoto_client::{CopotoClient, CredentialSet, KeyValueStore, MemoryStore, Navigator};
use parking_lot::Mutex;
use serde_json::{Value, json};
use wiremock::MockServer;

/// Path of the refresh endpoint as the server sees it.
pub const REFRESH: &str = "/api/user/token/refresh";

/// Navigator that records every transition.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    location: Mutex<Option<String>>,
    logins: AtomicUsize,
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn at(location: &str) -> Arc<Self> {
        let navigator = Self::default();
        *navigator.location.lock() = Some(location.to_string());
        Arc::new(navigator)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> Option<String> {
        self.location.lock().clone()
    }

    fn to_login(&self) {
        self.logins.fetch_add(1, Ordering::SeqCst);
    }

    fn to_location(&self, location: &str) {
        self.visited.lock().push(location.to_string());
        *self.location.lock() = Some(location.to_string());
    }
}

/// A client wired to a mock server with in-memory storage.
pub struct TestClient {
    pub client: CopotoClient,
    pub storage: Arc<MemoryStore>,
    pub navigator: Arc<RecordingNavigator>,
}

impl TestClient {
    pub fn new(server: &MockServer, credentials: CredentialSet) -> Self {
        Self::at(server, credentials, "/posts/7")
    }

    pub fn at(server: &MockServer, credentials: CredentialSet, location: &str) -> Self {
        let storage = Arc::new(MemoryStore::new());
        let navigator = RecordingNavigator::at(location);
        let client = CopotoClient::builder()
            .base_url(server.uri())
            .timeout(Duration::from_secs(5))
            .storage(storage.clone())
            .navigator(navigator.clone())
            .credentials(credentials)
            .build()
            .expect("client should build");

        Self {
            client,
            storage,
            navigator,
        }
    }

    /// Read a raw value from the client's durable storage.
    pub fn storage_value(&self, key: &str) -> Option<String> {
        self.storage.get(key)
    }
}

/// Server envelope carrying token data.
pub fn tokens(data: Value) -> Value {
    json!({"status": 200, "message": "Token refreshed", "data": data})
}

/// Server envelope for an error.
pub fn failure(status: u16, message: &str) -> Value {
    json!({"status": status, "message": message, "data": null})
}

/// Number of requests the server received on `path`.
pub async fn hits(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == path)
        .count()
}

/// Number of requests on paths starting with `prefix` that carried `bearer`.
pub async fn hits_with_bearer(server: &MockServer, prefix: &str, bearer: &str) -> usize {
    let expected = format!("Bearer {}", bearer);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with(prefix))
        .filter(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some(expected.as_str())
        })
        .count()
}
