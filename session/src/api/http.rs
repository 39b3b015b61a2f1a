//! HTTP implementation of the remote auth API

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{
    ApiError, AuthResponse, ErrorBody, LoginRequest, RefreshRequest, RefreshResponse,
    RegisterRequest,
};
use super::AuthApi;
use crate::config::ApiConfig;
use crate::session::state::UserProfile;

/// Profile endpoint answers either with the bare profile or `{"user": {...}}`
#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileBody {
    Wrapped { user: UserProfile },
    Bare(UserProfile),
}

impl From<ProfileBody> for UserProfile {
    fn from(body: ProfileBody) -> Self {
        match body {
            ProfileBody::Wrapped { user } => user,
            ProfileBody::Bare(user) => user,
        }
    }
}

/// `AuthApi` over the club site's REST endpoints
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, classifying failures; returns the successful response
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::into_message);
        debug!("Auth API returned {}: {:?}", status, message);
        Err(ApiError::from_status(status.as_u16(), message))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.send_json(self.client.post(self.url("/auth/login")).json(request))
            .await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.send_json(self.client.post(self.url("/auth/register")).json(request))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.send_json(self.client.post(self.url("/auth/refresh")).json(&body))
            .await
    }

    async fn profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        let body: ProfileBody = self
            .send_json(
                self.client
                    .get(self.url("/auth/profile"))
                    .bearer_auth(access_token),
            )
            .await?;
        Ok(body.into())
    }

    async fn logout(&self, access_token: &str) -> Result<(), ApiError> {
        self.send(
            self.client
                .post(self.url("/auth/logout"))
                .bearer_auth(access_token),
        )
        .await?;
        Ok(())
    }
}
