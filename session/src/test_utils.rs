//! Test Utilities Module
//!
//! Scripted `AuthApi` and fixtures for unit tests. Only compiled for tests.

#![cfg(test)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::api::{
    ApiError, AuthApi, AuthResponse, LoginRequest, RefreshResponse, RegisterRequest,
};
use crate::session::state::{Role, UserProfile};

/// One recorded call, with the identifying argument (email or token)
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Login(String),
    Register(String),
    Refresh(String),
    Profile(String),
    Logout(String),
}

/// `AuthApi` that replays queued responses in order.
///
/// An empty queue answers with `ApiError::Unauthorized`, except logout which
/// succeeds unless `fail_logout` was called.
#[derive(Default)]
pub struct MockAuthApi {
    calls: Mutex<Vec<ApiCall>>,
    login: Mutex<VecDeque<Result<AuthResponse, ApiError>>>,
    register: Mutex<VecDeque<Result<AuthResponse, ApiError>>>,
    refresh: Mutex<VecDeque<Result<RefreshResponse, ApiError>>>,
    profile: Mutex<VecDeque<Result<UserProfile, ApiError>>>,
    logout_error: Mutex<Option<ApiError>>,
    login_gates: Mutex<VecDeque<Arc<Notify>>>,
    profile_gates: Mutex<VecDeque<Arc<Notify>>>,
}

fn pop<T>(queue: &Mutex<VecDeque<Result<T, ApiError>>>) -> Result<T, ApiError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or(Err(ApiError::Unauthorized { message: None }))
}

/// Take the response first, then wait on the call's gate if one is queued
async fn gated<T>(
    gates: &Mutex<VecDeque<Arc<Notify>>>,
    queue: &Mutex<VecDeque<Result<T, ApiError>>>,
) -> Result<T, ApiError> {
    let response = pop(queue);
    let gate = gates.lock().unwrap().pop_front();
    if let Some(gate) = gate {
        gate.notified().await;
    }
    response
}

fn new_gate(gates: &Mutex<VecDeque<Arc<Notify>>>) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    gates.lock().unwrap().push_back(gate.clone());
    gate
}

impl MockAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn on_login(&self, response: Result<AuthResponse, ApiError>) {
        self.login.lock().unwrap().push_back(response);
    }

    pub fn on_register(&self, response: Result<AuthResponse, ApiError>) {
        self.register.lock().unwrap().push_back(response);
    }

    pub fn on_refresh(&self, response: Result<RefreshResponse, ApiError>) {
        self.refresh.lock().unwrap().push_back(response);
    }

    pub fn on_profile(&self, response: Result<UserProfile, ApiError>) {
        self.profile.lock().unwrap().push_back(response);
    }

    pub fn fail_logout(&self, error: ApiError) {
        *self.logout_error.lock().unwrap() = Some(error);
    }

    /// Make the next ungated login call wait until the returned handle is
    /// notified. Each call takes its queued response before waiting.
    pub fn hold_login(&self) -> Arc<Notify> {
        new_gate(&self.login_gates)
    }

    /// Same as `hold_login`, for profile calls
    pub fn hold_profile(&self) -> Arc<Notify> {
        new_gate(&self.profile_gates)
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.record(ApiCall::Login(request.email.clone()));
        gated(&self.login_gates, &self.login).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.record(ApiCall::Register(request.email.clone()));
        pop(&self.register)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        self.record(ApiCall::Refresh(refresh_token.to_string()));
        pop(&self.refresh)
    }

    async fn profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        self.record(ApiCall::Profile(access_token.to_string()));
        gated(&self.profile_gates, &self.profile).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        self.record(ApiCall::Logout(access_token.to_string()));
        match self.logout_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Profile fixture with a stable name/email per role
pub fn profile(role: Role) -> UserProfile {
    UserProfile {
        name: Some("Test Member".to_string()),
        email: Some("member@vlsiclub.test".to_string()),
        ..UserProfile::new(role)
    }
}

/// Complete login/register response
pub fn auth_response(access: &str, refresh: &str, role: Role) -> AuthResponse {
    AuthResponse {
        access_token: Some(access.to_string()),
        refresh_token: Some(refresh.to_string()),
        user: Some(profile(role)),
    }
}
