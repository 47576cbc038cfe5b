//! Per-request session resolution and page gating.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use tracing::{debug, info};

use crate::guard::{GuardDecision, RouteKind, SessionState};
use crate::metrics::MetricsRecorder;
use crate::state::AppState;
use crate::store::{CookiePersistence, PendingCookie, SessionStore};

/// Opens the session cookie into a request-scoped [`SessionStore`], refreshes
/// an expired access token, and writes any session change back as a cookie.
pub async fn resolve_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> (CookieJar, Response) {
    let codec = state.cookies.clone();
    let persistence = Arc::new(CookiePersistence::new(codec.clone()));
    let now = Utc::now();

    let (initial, issued_at, rejected) = match jar.get(codec.name()) {
        Some(cookie) => match codec.decode(cookie.value()) {
            Some(decoded) => (Some(decoded.session), Some(decoded.issued_at), false),
            None => (None, None, true),
        },
        None => (None, None, false),
    };

    let store = Arc::new(SessionStore::new(initial, persistence.clone()));
    if rejected {
        debug!("Dropping invalid session cookie");
        store.clear();
    }

    if let Some(session) = store.get() {
        let mut renew = issued_at.is_some_and(|iat| codec.needs_reissue(iat, now));
        if !session.is_errored()
            && !session.is_valid_at(now.timestamp_millis())
            && !replaces_session(&state, request.uri().path())
        {
            match state.coordinator.ensure_fresh(&store).await {
                Ok(_) => renew = true,
                Err(e) => debug!(session_id = %session.id, "Session not refreshed: {}", e),
            }
        }
        if renew {
            if let Some(current) = store.get() {
                store.set(current.renewed(now, codec.max_age()));
            }
        }
    }

    request.extensions_mut().insert(store);
    let response = next.run(request).await;

    let jar = match persistence.take_pending() {
        Some(PendingCookie::Write(cookie)) => jar.add(cookie),
        Some(PendingCookie::Remove) => jar.remove(codec.removal()),
        None => jar,
    };
    (jar, response)
}

/// Login and sign-out replace the session; no refresh runs for them.
fn replaces_session(state: &AppState, path: &str) -> bool {
    let prefix = state.config.routes.api_prefix.trim_end_matches('/');
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest == "/auth/login" || rest == "/auth/signout")
}

/// Redirects page navigations according to the route guard.
pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let kind = state.guard.classify(&path);
    if matches!(kind, RouteKind::Bypass | RouteKind::Api) {
        return next.run(request).await;
    }

    let store = request.extensions().get::<Arc<SessionStore>>().cloned();
    let session = store.as_ref().and_then(|s| s.get());
    let decision = state.guard.evaluate(
        &path,
        request.uri().query(),
        SessionState::of(session.as_ref()),
    );
    state.metrics.record_guard_decision(decision.label());

    // A dead session is dropped once the navigation no longer needs it.
    let ends_errored = matches!(decision, GuardDecision::RedirectToSignIn { .. })
        || kind == RouteKind::Public;
    if let (Some(store), Some(session)) = (&store, &session) {
        if ends_errored && session.is_errored() {
            info!(session_id = %session.id, "Ending session after failed refresh");
            store.clear();
        }
    }

    match decision.location() {
        Some(location) => Redirect::temporary(location).into_response(),
        None => next.run(request).await,
    }
}
