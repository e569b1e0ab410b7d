//! Single-flight token refresh.
//!
//! When many requests fail with an expired access token at once, exactly one
//! refresh call goes to the server. The first caller moves the coordinator
//! from idle to refreshing under the state lock, before any I/O, and starts
//! the flight. Everyone arriving while the flight is up joins the waiter
//! queue. When the flight lands the queue is taken out and the state reset to
//! idle in the same critical section, then every waiter is resolved in FIFO
//! order with the same outcome.
//!
//! The refresh call runs as its own task. Dropping a caller's future only
//! drops that caller's receiver; the flight still lands and the remaining
//! waiters are still resolved.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tokio::sync::oneshot;
use url::Url;

use crate::classify::{FailureClass, classify};
use crate::credentials::{CredentialStore, CredentialUpdate};
use crate::error::{Error, Result};
use crate::request::Attempt;
use crate::types::{ApiEnvelope, RefreshRequest};

// ============================================================================
// RefreshFailure
// ============================================================================

/// Why a refresh flight did not produce a new access token.
///
/// Cloneable so one outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    /// The refresh endpoint refused the refresh token (401/403).
    #[error("refresh token rejected ({status})")]
    Rejected { status: u16 },

    /// The refresh endpoint answered with another non-success status.
    #[error("refresh endpoint returned {status}")]
    Status { status: u16 },

    /// The refresh request never got a usable response.
    #[error("refresh request failed: {0}")]
    Transport(String),

    /// The refresh response carried no access token.
    #[error("refresh response carried no access token")]
    MissingAccessToken,

    /// The flight ended without an outcome.
    #[error("refresh abandoned before completion")]
    Abandoned,

    /// The session ended while the refresh was in flight.
    #[error("session ended during refresh")]
    SessionEnded,
}

// ============================================================================
// Refresher
// ============================================================================

/// Performs the refresh network call.
///
/// Implementations must not attach the session's access token; the refresh
/// token travels in the request body.
#[async_trait]
pub trait Refresher: Send + Sync + std::fmt::Debug {
    /// Exchange a refresh token for new credentials.
    async fn refresh(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<CredentialUpdate, RefreshFailure>;
}

/// Refresher calling `POST /api/user/token/refresh` over an undecorated client.
#[derive(Debug, Clone)]
pub struct HttpRefresher {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpRefresher {
    /// Create a refresher for the API rooted at `base_url`.
    pub fn new(base_url: &Url, timeout: Duration, user_agent: &str) -> Result<Self> {
        let url = base_url.join(&format!("api/{}", crate::request::REFRESH_PATH))?;
        let http = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { http, url, timeout })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Refresher for HttpRefresher {
    async fn refresh(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<CredentialUpdate, RefreshFailure> {
        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&RefreshRequest { refresh_token })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            return Err(match classify(Some(status), true, Attempt::Original) {
                FailureClass::RefreshEndpointFailure => RefreshFailure::Rejected {
                    status: status_code,
                },
                _ => RefreshFailure::Status { status: status_code },
            });
        }

        let envelope: ApiEnvelope<CredentialUpdate> = response
            .json()
            .await
            .map_err(|e| RefreshFailure::Transport(format!("invalid refresh response: {}", e)))?;

        Ok(envelope.data.unwrap_or_default())
    }
}

// ============================================================================
// RefreshCoordinator
// ============================================================================

type Outcome = std::result::Result<String, RefreshFailure>;
type Waiter = oneshot::Sender<Outcome>;

#[derive(Debug)]
enum FlightState {
    Idle,
    Refreshing { waiters: VecDeque<Waiter> },
}

/// Owns the idle/refreshing state and the waiter queue.
#[derive(Debug)]
pub struct RefreshCoordinator {
    state: Mutex<FlightState>,
    credentials: Arc<CredentialStore>,
    refresher: Arc<dyn Refresher>,
    flights: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(credentials: Arc<CredentialStore>, refresher: Arc<dyn Refresher>) -> Self {
        Self {
            state: Mutex::new(FlightState::Idle),
            credentials,
            refresher,
            flights: AtomicU64::new(0),
        }
    }

    /// Whether a refresh flight is in progress.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), FlightState::Refreshing { .. })
    }

    /// Number of callers queued behind the current flight.
    pub fn waiting(&self) -> usize {
        match &*self.state.lock() {
            FlightState::Refreshing { waiters } => waiters.len(),
            FlightState::Idle => 0,
        }
    }

    /// Number of refresh flights started so far.
    pub fn flights(&self) -> u64 {
        self.flights.load(Ordering::SeqCst)
    }

    /// Obtain a fresh access token after a session-expiry failure.
    ///
    /// `rejected` is the access token the failed request carried. If the
    /// store already holds a different one, a refresh has landed since that
    /// request left and the current token is returned without a new flight.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn refresh(self: &Arc<Self>, rejected: Option<&str>) -> Result<String> {
        let receiver = match self.join_or_start(rejected)? {
            Ticket::Current(token) => return Ok(token),
            Ticket::Wait(receiver) => receiver,
        };

        match receiver.await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(failure)) => Err(Error::RefreshFailed(failure)),
            Err(_) => Err(Error::RefreshFailed(RefreshFailure::Abandoned)),
        }
    }

    fn join_or_start(self: &Arc<Self>, rejected: Option<&str>) -> Result<Ticket> {
        let mut state = self.state.lock();

        if let FlightState::Refreshing { waiters } = &mut *state {
            let (tx, rx) = oneshot::channel();
            waiters.push_back(tx);
            tracing::debug!(position = waiters.len(), "Queued behind in-flight token refresh");
            return Ok(Ticket::Wait(rx));
        }

        let (generation, current) = self.credentials.session();
        if let Some(token) = current.access_token.as_deref()
            && Some(token) != rejected
        {
            tracing::debug!("Access token changed since request was sent, reusing it");
            return Ok(Ticket::Current(token.to_string()));
        }

        let Some(refresh_token) = current.refresh_token.filter(|t| !t.is_empty()) else {
            tracing::warn!("Session expired and no refresh token is stored");
            return Err(Error::MissingRefreshCredential);
        };

        let (tx, rx) = oneshot::channel();
        *state = FlightState::Refreshing {
            waiters: VecDeque::new(),
        };
        let flight = self.flights.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(flight, "Access token expired, refreshing");

        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.fly(generation, refresh_token, tx).await });

        Ok(Ticket::Wait(rx))
    }

    async fn fly(self: Arc<Self>, generation: u64, refresh_token: String, leader: Waiter) {
        let guard = FlightGuard {
            coordinator: &self,
            leader: Some(leader),
        };

        let outcome = match self.refresher.refresh(&refresh_token).await {
            Ok(update) => self.install(generation, &update),
            Err(failure) => Err(failure),
        };

        guard.land(outcome);
    }

    /// Store the refreshed tokens in the session the flight started in.
    fn install(&self, generation: u64, update: &CredentialUpdate) -> Outcome {
        let access_token = update
            .access_token()
            .map(String::from)
            .ok_or(RefreshFailure::MissingAccessToken)?;

        match self.credentials.apply(generation, update) {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::info!("Session ended during token refresh, discarding new tokens");
                return Err(RefreshFailure::SessionEnded);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Refreshed credentials could not be persisted");
            }
        }

        Ok(access_token)
    }

    /// Reset to idle and resolve every caller of the finished flight.
    fn land(&self, leader: Waiter, outcome: Outcome) {
        let waiters = match std::mem::replace(&mut *self.state.lock(), FlightState::Idle) {
            FlightState::Refreshing { waiters } => waiters,
            FlightState::Idle => VecDeque::new(),
        };

        match &outcome {
            Ok(_) => tracing::info!(waiters = waiters.len(), "Token refresh succeeded"),
            Err(failure) => {
                tracing::warn!(waiters = waiters.len(), error = %failure, "Token refresh failed")
            }
        }

        // A closed receiver means that caller went away; nothing to deliver.
        let _ = leader.send(outcome.clone());
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

enum Ticket {
    Current(String),
    Wait(oneshot::Receiver<Outcome>),
}

/// Lands the flight as abandoned if the refresh task ends without an outcome.
struct FlightGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    leader: Option<Waiter>,
}

impl FlightGuard<'_> {
    fn land(mut self, outcome: Outcome) {
        if let Some(leader) = self.leader.take() {
            self.coordinator.land(leader, outcome);
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if let Some(leader) = self.leader.take() {
            self.coordinator.land(leader, Err(RefreshFailure::Abandoned));
        }
    }
}
