//! Failure classification.
//!
//! Decides where a failed response is routed. Classification has no side
//! effects; acting on the result is up to the caller.

use reqwest::StatusCode;

use crate::request::{Attempt, RequestDescriptor};

/// Routing decision for a failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The refresh call itself was refused. Terminal.
    RefreshEndpointFailure,
    /// The access token expired; recoverable through a refresh.
    SessionExpired,
    /// A replayed request was refused again. Terminal.
    AlreadyRetried,
    /// Anything else; returned to the caller unchanged.
    Unrelated,
}

impl FailureClass {
    /// Whether this failure ends the session.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FailureClass::RefreshEndpointFailure | FailureClass::AlreadyRetried
        )
    }
}

/// Classify a failure.
///
/// `status` is `None` for transport errors that produced no response.
pub fn classify(
    status: Option<StatusCode>,
    is_refresh_call: bool,
    attempt: Attempt,
) -> FailureClass {
    match status {
        Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) if is_refresh_call => {
            FailureClass::RefreshEndpointFailure
        }
        Some(StatusCode::UNAUTHORIZED) => match attempt {
            Attempt::Original => FailureClass::SessionExpired,
            Attempt::RetriedAfterRefresh => FailureClass::AlreadyRetried,
        },
        _ => FailureClass::Unrelated,
    }
}

/// Classify a failed response to `request`.
pub fn classify_response(request: &RequestDescriptor, status: StatusCode) -> FailureClass {
    classify(Some(status), request.is_refresh_call(), request.attempt())
}
