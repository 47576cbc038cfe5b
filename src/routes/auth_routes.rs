//! Sign-in, session and sign-out endpoints used by the UI.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::models::ClientSession;
use crate::state::AppState;
use crate::utils::http_helpers::{HTTPError, SessionHandle};

/// Registers the session routes; nested under the API prefix.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/session", get(read_session).post(update_session))
        .route("/auth/signout", get(sign_out).post(sign_out))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// Exchanges credentials for a session and sets the session cookie.
async fn login(
    State(state): State<AppState>,
    SessionHandle(store): SessionHandle,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ClientSession>, HTTPError> {
    let session = state.credentials.login(&body.username, &body.password).await?;
    let view = session.client_view();
    store.set(session);
    Ok(Json(view))
}

/// The current session, or `null` when signed out.
async fn read_session(SessionHandle(store): SessionHandle) -> Json<Option<ClientSession>> {
    Json(store.get().map(|s| s.client_view()))
}

/// Forces a refresh so that server-side changes such as the onboarding flag
/// are picked up.
async fn update_session(
    State(state): State<AppState>,
    SessionHandle(store): SessionHandle,
) -> Result<Json<ClientSession>, HTTPError> {
    let session = state.coordinator.refresh_now(&store).await?;
    Ok(Json(session.client_view()))
}

async fn sign_out(
    State(state): State<AppState>,
    SessionHandle(store): SessionHandle,
) -> impl IntoResponse {
    store.clear();
    Redirect::to(state.guard.sign_in_path())
}
