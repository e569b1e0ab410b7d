//! Outbound request descriptors and credential decoration.

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::credentials::CredentialSet;
use crate::error::{Error, Result};

/// Header carrying the anti-forgery token.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// API path of the token refresh endpoint.
pub const REFRESH_PATH: &str = "user/token/refresh";

/// Where a request is in its retry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// First dispatch.
    Original,
    /// Replayed once after a token refresh; a further 401 is terminal.
    RetriedAfterRefresh,
}

/// Immutable description of an API call.
///
/// Descriptors are never mutated in flight; a retry produces a new
/// descriptor with [`Attempt::RetriedAfterRefresh`].
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    attempt: Attempt,
}

impl RequestDescriptor {
    /// Describe a request to an API path (relative to `/api/`).
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method,
            path: path.trim_start_matches('/').to_string(),
            query: Vec::new(),
            body: None,
            attempt: Attempt::Original,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    pub fn retried_after_refresh(&self) -> bool {
        self.attempt == Attempt::RetriedAfterRefresh
    }

    /// Whether this call targets the refresh endpoint itself.
    pub fn is_refresh_call(&self) -> bool {
        self.path.split('?').next() == Some(REFRESH_PATH)
    }

    /// Descriptor for the single replay after a refresh.
    pub(crate) fn into_retry(self) -> Self {
        Self {
            attempt: Attempt::RetriedAfterRefresh,
            ..self
        }
    }
}

/// Build the headers every decorated request carries.
///
/// Absent credentials produce no header. The result replaces any previous
/// credential headers, so decorating a replayed request is safe.
pub fn credential_headers(credentials: &CredentialSet) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(token) = credentials.access_token.as_deref().filter(|t| !t.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| Error::Config("Invalid access token".to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    if let Some(csrf) = credentials
        .anti_forgery_token
        .as_deref()
        .filter(|t| !t.is_empty())
    {
        let mut value = HeaderValue::from_str(csrf)
            .map_err(|_| Error::Config("Invalid anti-forgery token".to_string()))?;
        value.set_sensitive(true);
        headers.insert(HeaderName::from_static("x-csrf-token"), value);
    }

    Ok(headers)
}
