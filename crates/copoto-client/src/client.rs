//! Main client implementation.
//!
//! Every call runs the same pipeline: decorate with the current credentials,
//! dispatch, and on failure classify. Unrelated failures go straight back to
//! the caller. A session-expiry failure waits on the refresh coordinator and
//! is replayed exactly once with the new token. Terminal failures end the
//! session through the [`SessionTerminator`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::Response;
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::AuthApi;
use crate::classify::{FailureClass, classify_response};
use crate::credentials::{CredentialSet, CredentialStore};
use crate::error::{Error, Result};
use crate::refresh::{HttpRefresher, RefreshCoordinator, RefreshFailure, Refresher};
use crate::request::{RequestDescriptor, credential_headers};
use crate::session::{LoggingNavigator, Navigator, SessionTerminator};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::types::ApiEnvelope;

/// Default timeout for requests, including the refresh call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Copoto API client.
///
/// Cheap to clone; clones share credentials, the refresh coordinator and the
/// session terminator.
///
/// # Example
///
/// ```no_run
/// use copoto_client::CopotoClient;
///
/// # async fn example() -> copoto_client::Result<()> {
/// let client = CopotoClient::builder()
///     .base_url("http://localhost:8080")
///     .build()?;
///
/// client.auth().login("alice", "hunter2").await?;
/// let posts: serde_json::Value = client.get("posts").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CopotoClient {
    inner: Arc<ClientInner>,
}

/// Inner client state (shared across clones).
#[derive(Debug)]
pub(crate) struct ClientInner {
    /// HTTP client for decorated requests.
    pub(crate) http: reqwest::Client,
    /// Base URL of the server.
    pub(crate) base_url: Url,
    /// Request timeout.
    pub(crate) timeout: Duration,
    pub(crate) credentials: Arc<CredentialStore>,
    pub(crate) coordinator: Arc<RefreshCoordinator>,
    pub(crate) terminator: Arc<SessionTerminator>,
}

impl CopotoClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Session credentials.
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.inner.credentials
    }

    /// Refresh coordinator shared by all clones.
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.inner.coordinator
    }

    /// Session terminator shared by all clones.
    pub fn terminator(&self) -> &Arc<SessionTerminator> {
        &self.inner.terminator
    }

    /// Access the authentication API.
    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.clone())
    }

    /// Navigate back to where the user was when the last session ended.
    pub fn resume_after_login(&self) -> Result<Option<String>> {
        self.inner.terminator.resume_after_login()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request pipeline
    // ─────────────────────────────────────────────────────────────────────────

    /// Build a URL for an API path.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        self.inner
            .base_url
            .join(&format!("api/{}", path))
            .map_err(Error::from)
    }

    /// Execute a request, recovering from an expired session at most once.
    pub async fn execute(&self, request: RequestDescriptor) -> Result<Response> {
        let credentials = self.inner.credentials.snapshot();
        let response = self.dispatch(&request, &credentials).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match classify_response(&request, status) {
            FailureClass::SessionExpired => {}
            class => return Err(self.fail(class, response).await),
        }

        tracing::debug!(path = request.path(), "Session expired, awaiting token refresh");
        let token = match self
            .inner
            .coordinator
            .refresh(credentials.access_token.as_deref())
            .await
        {
            Ok(token) => token,
            Err(e) => return Err(self.terminate(e)),
        };

        self.retry(request, token).await
    }

    /// Dispatch a decorated request without session recovery.
    ///
    /// A rejection is returned as the server's error; nothing is refreshed
    /// and the session is not terminated.
    pub(crate) async fn execute_once(&self, request: RequestDescriptor) -> Result<Response> {
        let credentials = self.inner.credentials.snapshot();
        let response = self.dispatch(&request, &credentials).await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(extract_error(response).await)
    }

    /// Replay a request once with a freshly issued access token.
    async fn retry(&self, request: RequestDescriptor, access_token: String) -> Result<Response> {
        let request = request.into_retry();
        let credentials = CredentialSet {
            access_token: Some(access_token),
            ..self.inner.credentials.snapshot()
        };

        let response = self.dispatch(&request, &credentials).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let class = classify_response(&request, status);
        Err(self.fail(class, response).await)
    }

    /// Turn a non-recoverable failed response into the caller's error.
    async fn fail(&self, class: FailureClass, response: Response) -> Error {
        match class {
            FailureClass::AlreadyRetried => self.terminate(Error::AlreadyRetried),
            FailureClass::RefreshEndpointFailure => {
                let status = response.status().as_u16();
                self.terminate(Error::RefreshFailed(RefreshFailure::Rejected { status }))
            }
            FailureClass::SessionExpired => Error::SessionExpired,
            FailureClass::Unrelated => extract_error(response).await,
        }
    }

    fn terminate(&self, error: Error) -> Error {
        if error.is_terminal() {
            self.inner.terminator.terminate(&error);
        }
        error
    }

    async fn dispatch(
        &self,
        request: &RequestDescriptor,
        credentials: &CredentialSet,
    ) -> Result<Response> {
        let url = self.url(request.path())?;
        let mut builder = self
            .inner
            .http
            .request(request.method().clone(), url)
            .headers(credential_headers(credentials)?)
            .timeout(self.inner.timeout);

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        tracing::debug!(
            method = %request.method(),
            path = request.path(),
            attempt = ?request.attempt(),
            "Dispatching request"
        );
        Ok(builder.send().await?)
    }

    /// Dispatch without credentials or session recovery (login).
    pub(crate) async fn post_anonymous<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        let request = RequestDescriptor::post(path).with_json(body)?;
        let response = self.dispatch(&request, &CredentialSet::default()).await?;
        handle_response(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Typed helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Execute a request and deserialize the JSON response.
    pub async fn send<T: DeserializeOwned>(&self, request: RequestDescriptor) -> Result<T> {
        let response = self.execute(request).await?;
        Ok(response.json().await?)
    }

    /// Make a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(RequestDescriptor::get(path)).await
    }

    /// Make a POST request.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.send(RequestDescriptor::post(path).with_json(body)?).await
    }

    /// Make a PUT request.
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.send(RequestDescriptor::put(path).with_json(body)?).await
    }

    /// Make a PATCH request.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.send(RequestDescriptor::patch(path).with_json(body)?).await
    }

    /// Make a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.execute(RequestDescriptor::delete(path)).await?;
        Ok(())
    }
}

/// Handle a response, extracting the body or error.
async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    if response.status().is_success() {
        Ok(response.json().await?)
    } else {
        Err(extract_error(response).await)
    }
}

/// Extract an error from a failed response.
async fn extract_error(response: Response) -> Error {
    let status = response.status().as_u16();

    match response.json::<ApiEnvelope<serde_json::Value>>().await {
        Ok(ApiEnvelope {
            message: Some(message),
            ..
        }) => Error::Api { status, message },
        _ => Error::Api {
            status,
            message: format!("HTTP {}", status),
        },
    }
}

/// Builder for creating a CopotoClient.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
    storage: Option<Arc<dyn KeyValueStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    refresher: Option<Arc<dyn Refresher>>,
    credentials: Option<CredentialSet>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            storage: None,
            navigator: None,
            refresher: None,
            credentials: None,
        }
    }

    /// Set the base URL for the server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout. Also bounds the refresh call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Durable storage for credentials and the post-login location.
    ///
    /// Defaults to an in-memory store.
    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Navigation facility used when a session ends.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Replace the HTTP refresher.
    pub fn refresher(mut self, refresher: Arc<dyn Refresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Start with these credentials, replacing anything in storage.
    pub fn credentials(mut self, credentials: CredentialSet) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<CopotoClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("copoto-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .user_agent(user_agent.clone())
            .build()?;

        let storage: Arc<dyn KeyValueStore> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(MemoryStore::new()),
        };
        let credentials = Arc::new(CredentialStore::load(storage.clone()));
        if let Some(initial) = self.credentials {
            credentials.replace(initial)?;
        }

        let refresher: Arc<dyn Refresher> = match self.refresher {
            Some(refresher) => refresher,
            None => Arc::new(HttpRefresher::new(&base_url, self.timeout, &user_agent)?),
        };
        let navigator: Arc<dyn Navigator> = match self.navigator {
            Some(navigator) => navigator,
            None => Arc::new(LoggingNavigator::new()),
        };

        let coordinator = Arc::new(RefreshCoordinator::new(credentials.clone(), refresher));
        let terminator = Arc::new(SessionTerminator::new(
            credentials.clone(),
            storage,
            navigator,
        ));

        Ok(CopotoClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
                credentials,
                coordinator,
                terminator,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
