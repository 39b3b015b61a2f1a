//! Remote auth API
//!
//! This module provides:
//! - `AuthApi` trait for the login/register/refresh/profile/logout endpoints
//! - `HttpAuthApi`, the reqwest-backed implementation
//! - Wire types and `ApiError` classification

pub mod http;
mod types;

pub use http::HttpAuthApi;
pub use types::{
    ApiError, AuthResponse, ErrorBody, LoginRequest, RefreshRequest, RefreshResponse,
    RegisterRequest,
};

use async_trait::async_trait;

use crate::session::state::UserProfile;

/// Trait for the remote auth API (HTTP in production, mocks in tests)
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token pair and profile
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;

    /// Create an account; same response shape as login
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;

    /// Mint a new access token from a refresh token
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError>;

    /// Fetch the profile of the bearer of `access_token`
    async fn profile(&self, access_token: &str) -> Result<UserProfile, ApiError>;

    /// Invalidate the session server-side
    async fn logout(&self, access_token: &str) -> Result<(), ApiError>;
}
