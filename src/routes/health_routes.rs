//! Liveness endpoint.

use crate::state::AppState;
use axum::{routing::get, Router};

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Returns 200 OK while the gateway is up; the backend is not probed.
async fn health_check() -> &'static str {
    "OK"
}
