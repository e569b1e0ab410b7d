//! Authenticated HTTP client for the Copoto community board API.
//!
//! Every request carries the session's bearer token and anti-forgery token.
//! When the server answers 401 the client refreshes the session and replays
//! the request once. However many requests fail together, only one refresh
//! call is made; the rest wait for its outcome. If the session cannot be
//! renewed it is terminated: credentials are cleared, the current location
//! is remembered, and the user is sent to login.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use copoto_client::{CopotoClient, FileStore, Result};
//!
//! # async fn example() -> Result<()> {
//! let client = CopotoClient::builder()
//!     .base_url("http://localhost:8080")
//!     .storage(Arc::new(FileStore::open("/tmp/copoto/credentials.json")?))
//!     .build()?;
//!
//! client.auth().login("alice", "hunter2").await?;
//!
//! // Expired tokens are refreshed transparently.
//! let posts: serde_json::Value = client.get("posts?boardType=free").await?;
//! println!("{}", posts);
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`credentials`]: credential store with all-or-nothing updates
//! - [`request`]: immutable request descriptors and credential decoration
//! - [`classify`]: routing of failed responses
//! - [`refresh`]: single-flight refresh coordinator
//! - [`session`]: session termination and post-login resumption
//! - [`storage`]: durable key-value storage

pub mod api;
pub mod classify;
pub mod client;
pub mod credentials;
pub mod error;
pub mod refresh;
pub mod request;
pub mod session;
pub mod storage;
pub mod types;

pub use api::AuthApi;
pub use classify::{FailureClass, classify};
pub use client::{ClientBuilder, CopotoClient};
pub use credentials::{CredentialSet, CredentialStore, CredentialUpdate};
pub use error::{Error, Result};
pub use refresh::{HttpRefresher, RefreshCoordinator, RefreshFailure, Refresher};
pub use request::{Attempt, RequestDescriptor};
pub use session::{AFTER_LOGIN_KEY, LoggingNavigator, Navigator, SessionTerminator};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
