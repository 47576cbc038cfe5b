use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::AuthError;
use crate::config::BackendConfig;

/// Tokens returned by a successful login.
#[derive(Deserialize, Clone)]
pub struct LoginGrant {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub is_first_login: bool,
}

/// Tokens returned by a successful refresh.
#[derive(Deserialize, Clone)]
pub struct RefreshGrant {
    pub access_token: String,
    /// Absent when the backend does not rotate refresh tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub is_first_login: Option<bool>,
}

impl std::fmt::Debug for LoginGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginGrant")
            .field("is_first_login", &self.is_first_login)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for RefreshGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshGrant")
            .field("rotated", &self.refresh_token.is_some())
            .field("is_first_login", &self.is_first_login)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// The identity service that issues and rotates tokens.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    fn get_name(&self) -> &str;

    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, AuthError>;
}

/// [`IdentityBackend`] speaking JSON over HTTP.
pub struct HttpIdentityBackend {
    config: BackendConfig,
    client: reqwest::Client,
}

impl HttpIdentityBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, AuthError> {
        info!("Creating HTTP identity backend for '{}'", config.base_url);
        let client = build_client(config)?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }
}

/// HTTP client with the configured backend timeout applied to every call.
pub fn build_client(config: &BackendConfig) -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.timeout_in_ms))
        .build()
        .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {}", e)))
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    fn get_name(&self) -> &str {
        &self.config.base_url
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, AuthError> {
        let url = self.config.url_for(&self.config.login_path);
        debug!("Calling login endpoint {}", url);

        let resp = self
            .client
            .post(&url)
            .json(&LoginBody { username, password })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            info!(status = status.as_u16(), "Login rejected by backend");
            return Err(AuthError::InvalidCredentials);
        }

        resp.json::<LoginGrant>()
            .await
            .map_err(|e| AuthError::MalformedToken(format!("Failed to parse login response: {}", e)))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, AuthError> {
        let url = self.config.url_for(&self.config.refresh_path);
        debug!("Calling refresh endpoint {}", url);

        let resp = self
            .client
            .post(&url)
            .json(&RefreshBody { refresh_token })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Refresh rejected by backend");
            return Err(AuthError::RefreshAccessToken);
        }

        resp.json::<RefreshGrant>().await.map_err(|e| {
            AuthError::MalformedToken(format!("Failed to parse refresh response: {}", e))
        })
    }
}
