//! Page navigations that made it past the route guard.

use axum::{extract::State, http::Uri, Json};
use serde_json::{json, Value};

use crate::guard::RouteKind;
use crate::state::AppState;
use crate::utils::http_helpers::{HTTPError, SessionHandle};

/// Render context handed to the UI layer: the page path and the session it
/// should render with.
pub async fn render_page(
    State(state): State<AppState>,
    SessionHandle(store): SessionHandle,
    uri: Uri,
) -> Result<Json<Value>, HTTPError> {
    if state.guard.classify(uri.path()) == RouteKind::Api {
        return Err(HTTPError::new(axum::http::StatusCode::NOT_FOUND, "Not found"));
    }

    let session = store.get().map(|s| s.client_view());
    Ok(Json(json!({
        "path": uri.path(),
        "session": session,
    })))
}
