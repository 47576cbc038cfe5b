//! HTTP route definitions and handlers.
//!
//! Session endpoints and the API forwarder live under the configured API
//! prefix; every other path is a page navigation answered by the fallback.
//! Both run behind the session layer and the route guard. Health and
//! metrics do not.

mod api_routes;
mod auth_routes;
mod health_routes;
mod metrics;
pub mod middleware;
mod page_routes;

use crate::state::AppState;
use axum::{middleware::from_fn_with_state, Router};

pub fn create_router(state: AppState) -> Router {
    let api_prefix = state.config.routes.api_prefix.trim_end_matches('/').to_string();

    let gated = Router::new()
        .nest(&api_prefix, auth_routes::routes().merge(api_routes::routes()))
        .fallback(page_routes::render_page)
        .layer(from_fn_with_state(state.clone(), middleware::route_guard))
        .layer(from_fn_with_state(state.clone(), middleware::resolve_session));

    Router::new()
        .merge(health_routes::routes())
        .merge(metrics::routes())
        .merge(gated)
        .with_state(state)
}
