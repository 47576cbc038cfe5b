use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::AuthError;
use crate::store::SessionStore;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    message: String,
}

impl HTTPError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<AuthError> for HTTPError {
    fn from(e: AuthError) -> Self {
        let status = match &e {
            AuthError::MissingCredential(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated
            | AuthError::RefreshAccessToken => StatusCode::UNAUTHORIZED,
            AuthError::Network(_) => StatusCode::BAD_GATEWAY,
            AuthError::MalformedToken(_) | AuthError::Config(_) => {
                tracing::error!("Internal auth error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        HTTPError::new(status, e.to_string())
    }
}

/// The request's session store, placed in extensions by the session layer.
pub struct SessionHandle(pub Arc<SessionStore>);

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = HTTPError;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<SessionStore>>()
            .cloned()
            .map(SessionHandle)
            .ok_or_else(|| {
                tracing::error!("Session layer is not installed for this route");
                HTTPError::new(StatusCode::INTERNAL_SERVER_ERROR, "Session unavailable")
            })
    }
}
