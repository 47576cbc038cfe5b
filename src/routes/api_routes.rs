//! Authenticated pass-through to the backend API.

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{header::CONTENT_TYPE, HeaderMap, Method},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};

use crate::auth::{ApiRequest, AuthError};
use crate::state::AppState;
use crate::utils::http_helpers::{HTTPError, SessionHandle};

pub fn routes() -> Router<AppState> {
    Router::new().route("/backend/{*path}", any(forward))
}

/// Sends the request to `{base_url}/{path}` with the session's bearer token.
/// Method, query, content type and body are preserved; the backend's status
/// and body come back unchanged. A failed refresh ends the session.
async fn forward(
    State(state): State<AppState>,
    SessionHandle(store): SessionHandle,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HTTPError> {
    let mut request = ApiRequest::new(method, path).with_query(query);
    if !body.is_empty() {
        request = request.with_body(headers.get(CONTENT_TYPE).cloned(), body);
    }

    let upstream = state
        .client_for(store.clone())
        .send(request)
        .await
        .inspect_err(|e| {
            if *e == AuthError::RefreshAccessToken {
                store.clear();
            }
        })?;

    let mut response = (upstream.status, upstream.body).into_response();
    match upstream.headers.get(CONTENT_TYPE) {
        Some(content_type) => {
            response
                .headers_mut()
                .insert(CONTENT_TYPE, content_type.clone());
        }
        None => {
            response.headers_mut().remove(CONTENT_TYPE);
        }
    }
    Ok(response)
}
