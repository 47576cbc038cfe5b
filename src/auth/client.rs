use std::sync::Arc;

use axum::body::Bytes;
use chrono::Utc;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use tracing::{debug, info};

use super::error::AuthError;
use super::refresh::RefreshCoordinator;
use crate::config::BackendConfig;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::Session;
use crate::store::SessionStore;

/// An outbound call to the backend API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the backend base URL.
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<HeaderValue>,
    pub body: Option<Bytes>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            query: None,
            content_type: None,
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    pub fn with_body(mut self, content_type: Option<HeaderValue>, body: Bytes) -> Self {
        self.content_type = content_type;
        self.body = Some(body);
        self
    }

    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Result<Self, AuthError> {
        let body = serde_json::to_vec(value)
            .map_err(|e| AuthError::Config(format!("Failed to serialize request body: {}", e)))?;
        self.content_type = Some(HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(body));
        Ok(self)
    }
}

/// The backend's answer, passed through untouched.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Attaches the session's access token to backend calls and recovers from
/// one 401 per request by refreshing through the coordinator.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    backend: BackendConfig,
    coordinator: Arc<RefreshCoordinator>,
    store: Arc<SessionStore>,
    metrics: Metrics,
}

impl AuthenticatedClient {
    pub fn new(
        http: reqwest::Client,
        backend: BackendConfig,
        coordinator: Arc<RefreshCoordinator>,
        store: Arc<SessionStore>,
        metrics: Metrics,
    ) -> Self {
        AuthenticatedClient {
            http,
            backend,
            coordinator,
            store,
            metrics,
        }
    }

    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, AuthError> {
        let mut session = self.usable_session()?;
        if !session.is_valid_at(Utc::now().timestamp_millis()) {
            session = self.coordinator.ensure_fresh(&self.store).await?;
        }

        let response = self.dispatch(&request, &session.tokens.access_token).await?;
        if response.status != StatusCode::UNAUTHORIZED
            || request.retried
            || self.is_refresh_endpoint(&request.path)
        {
            return Ok(response);
        }

        request.retried = true;
        info!(
            session_id = %session.id,
            path = %request.path,
            "Backend rejected access token, refreshing"
        );
        let refreshed = self
            .coordinator
            .refresh_rejected(&self.store, &session.tokens.access_token)
            .await?;

        let retry = self.dispatch(&request, &refreshed.tokens.access_token).await?;
        self.metrics.record_request_retry(retry.status.as_u16());
        Ok(retry)
    }

    fn usable_session(&self) -> Result<Session, AuthError> {
        match self.store.get() {
            Some(session) if !session.is_errored() => Ok(session),
            Some(session) => {
                debug!(session_id = %session.id, "Refusing to send with an errored session");
                Err(AuthError::Unauthenticated)
            }
            None => Err(AuthError::Unauthenticated),
        }
    }

    fn is_refresh_endpoint(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or_default();
        path.trim_matches('/') == self.backend.refresh_path.trim_matches('/')
    }

    async fn dispatch(&self, request: &ApiRequest, access_token: &str) -> Result<ApiResponse, AuthError> {
        let mut url = self.backend.url_for(&request.path);
        if let Some(query) = &request.query {
            url.push('?');
            url.push_str(query);
        }

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .bearer_auth(access_token);
        if let Some(content_type) = &request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type.clone());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        debug!(status = status.as_u16(), path = %request.path, "Backend responded");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
