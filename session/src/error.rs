//! Errors surfaced by session operations

use serde::Serialize;
use thiserror::Error;

use crate::api::ApiError;
use crate::session::state::UserProfile;
use crate::store::StoreError;

pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response from server";
pub const NETWORK_ERROR_MESSAGE: &str = "Unable to reach the server. Please check your connection";

/// Failures returned by `SessionManager` operations.
///
/// The `Display` text is what ends up in `auth_error`, so it is written for
/// end users.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    /// Rejected locally before any network call
    #[error("{0}")]
    Validation(String),

    /// Server rejected the credentials
    #[error("{0}")]
    AuthFailure(String),

    /// Transport failure or 5xx; stored tokens are kept
    #[error("{0}")]
    NetworkOrServer(String),

    /// 2xx response missing required fields
    #[error("{}", INVALID_RESPONSE_MESSAGE)]
    InvalidResponseShape,

    #[error("Could not access stored credentials: {0}")]
    Storage(String),

    /// A newer login/register/logout started while this one was in flight
    #[error("Operation superseded by a newer session change")]
    Superseded,
}

impl AuthError {
    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation",
            AuthError::AuthFailure(_) => "auth_failure",
            AuthError::NetworkOrServer(_) => "network_or_server",
            AuthError::InvalidResponseShape => "invalid_response",
            AuthError::Storage(_) => "storage",
            AuthError::Superseded => "superseded",
        }
    }

    /// Classify an API failure for a credential exchange (login/register).
    /// `fallback` is used when the server gave no message.
    pub fn from_api(err: ApiError, fallback: &str) -> Self {
        match err {
            ApiError::Unauthorized { message } | ApiError::Rejected { message, .. } => {
                AuthError::AuthFailure(message.unwrap_or_else(|| fallback.to_string()))
            }
            ApiError::Server { message, .. } => {
                AuthError::NetworkOrServer(message.unwrap_or_else(|| fallback.to_string()))
            }
            ApiError::Transport(_) => AuthError::NetworkOrServer(NETWORK_ERROR_MESSAGE.to_string()),
            ApiError::Decode(_) => AuthError::InvalidResponseShape,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

/// `{success, error, user}` shape for rendering layers that prefer a flat
/// value over matching on `Result`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

impl From<Result<UserProfile, AuthError>> for AuthOutcome {
    fn from(result: Result<UserProfile, AuthError>) -> Self {
        match result {
            Ok(user) => Self {
                success: true,
                error: None,
                user: Some(user),
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
                user: None,
            },
        }
    }
}

impl From<Result<(), AuthError>> for AuthOutcome {
    fn from(result: Result<(), AuthError>) -> Self {
        Self {
            success: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            user: None,
        }
    }
}
