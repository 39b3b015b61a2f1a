//! Common Test Utilities for Integration Tests
//!
//! A small in-process fake of the club site's auth API, served by axum on a
//! random local port, plus helpers to wire a `SessionManager` against it.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use club_session::{Config, FileTokenStore, HttpAuthApi, SessionManager};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Registered account on the fake server
#[derive(Clone)]
pub struct Account {
    pub password: String,
    pub user: Value,
}

/// Mutable state of the fake auth server
#[derive(Default)]
pub struct FakeAuth {
    pub accounts: Mutex<HashMap<String, Account>>,
    pub access_tokens: Mutex<HashSet<String>>,
    pub refresh_tokens: Mutex<HashSet<String>>,
    /// Emails received by login, as sent on the wire
    pub login_emails: Mutex<Vec<String>>,
    pub refresh_calls: Mutex<usize>,
    pub profile_calls: Mutex<usize>,
    pub logout_calls: Mutex<usize>,
    /// Answer profile requests with 503
    pub profile_down: Mutex<bool>,
    /// Answer logout requests with 500
    pub logout_down: Mutex<bool>,
    counter: Mutex<u32>,
}

impl FakeAuth {
    pub fn add_account(&self, email: &str, password: &str, user: Value) {
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user,
            },
        );
    }

    pub fn grant_access(&self, token: &str) {
        self.access_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn grant_refresh(&self, token: &str) {
        self.refresh_tokens.lock().unwrap().insert(token.to_string());
    }

    fn next_token(&self, prefix: &str) -> String {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("{}{}", prefix, counter)
    }

    fn issue_pair(&self) -> (String, String) {
        let access = self.next_token("access-");
        let refresh = self.next_token("refresh-");
        self.grant_access(&access);
        self.grant_refresh(&refresh);
        (access, refresh)
    }
}

type Shared = Arc<FakeAuth>;

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

async fn login(State(auth): State<Shared>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default();
    auth.login_emails.lock().unwrap().push(email.clone());

    let account = auth.accounts.lock().unwrap().get(&email).cloned();
    match account {
        Some(account) if account.password == password => {
            let (access, refresh) = auth.issue_pair();
            Json(json!({ "accessToken": access, "refreshToken": refresh, "user": account.user }))
                .into_response()
        }
        _ => error(StatusCode::UNAUTHORIZED, "Invalid email or password"),
    }
}

async fn register(State(auth): State<Shared>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if auth.accounts.lock().unwrap().contains_key(&email) {
        return error(StatusCode::CONFLICT, "Email already registered");
    }

    let user = json!({
        "role": "USER",
        "requirePasswordChange": false,
        "name": body["name"],
        "email": email,
        "branch": body["branch"],
    });
    auth.add_account(&email, body["password"].as_str().unwrap_or_default(), user.clone());

    let (access, refresh) = auth.issue_pair();
    (
        StatusCode::CREATED,
        Json(json!({ "accessToken": access, "refreshToken": refresh, "user": user })),
    )
        .into_response()
}

async fn refresh(State(auth): State<Shared>, Json(body): Json<Value>) -> Response {
    *auth.refresh_calls.lock().unwrap() += 1;
    let token = body["refreshToken"].as_str().unwrap_or_default();
    if !auth.refresh_tokens.lock().unwrap().contains(token) {
        return error(StatusCode::UNAUTHORIZED, "Refresh token expired");
    }

    let access = auth.next_token("access-");
    auth.grant_access(&access);
    Json(json!({ "accessToken": access })).into_response()
}

async fn profile(State(auth): State<Shared>, headers: HeaderMap) -> Response {
    *auth.profile_calls.lock().unwrap() += 1;
    if *auth.profile_down.lock().unwrap() {
        return error(StatusCode::SERVICE_UNAVAILABLE, "Maintenance");
    }

    let Some(token) = bearer(&headers) else {
        return error(StatusCode::UNAUTHORIZED, "Missing token");
    };
    if !auth.access_tokens.lock().unwrap().contains(&token) {
        return error(StatusCode::UNAUTHORIZED, "Token expired");
    }

    // Any account will do; the fake does not track token ownership
    let user = auth
        .accounts
        .lock()
        .unwrap()
        .values()
        .next()
        .map(|a| a.user.clone());
    match user {
        Some(user) => Json(json!({ "user": user })).into_response(),
        None => error(StatusCode::NOT_FOUND, "No such user"),
    }
}

async fn logout(State(auth): State<Shared>, headers: HeaderMap) -> Response {
    *auth.logout_calls.lock().unwrap() += 1;
    if *auth.logout_down.lock().unwrap() {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable");
    }
    if let Some(token) = bearer(&headers) {
        auth.access_tokens.lock().unwrap().remove(&token);
    }
    StatusCode::NO_CONTENT.into_response()
}

/// A running fake auth API
pub struct TestServer {
    pub addr: SocketAddr,
    pub auth: Shared,
}

impl TestServer {
    pub async fn start() -> Self {
        let auth: Shared = Arc::new(FakeAuth::default());

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/profile", get(profile))
            .route("/api/auth/logout", post(logout))
            .with_state(auth.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self { addr, auth }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.api.base_url = self.base_url();
        config.api.timeout = Duration::from_secs(5);
        config
    }

    pub fn api(&self) -> Arc<HttpAuthApi> {
        Arc::new(HttpAuthApi::new(&self.config().api).expect("Failed to build client"))
    }

    /// A fresh manager over the HTTP client and a token file at `token_path`
    pub fn manager(&self, token_path: &Path) -> SessionManager {
        SessionManager::new(self.api(), Arc::new(FileTokenStore::new(token_path)))
    }
}

/// Profile JSON as the club API returns it
pub fn user_json(role: &str) -> Value {
    json!({
        "_id": "64f0c0ffee",
        "role": role,
        "requirePasswordChange": false,
        "name": "Test Member",
        "email": "test@example.com",
    })
}
