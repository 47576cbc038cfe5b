//! Shared application state.

use std::sync::Arc;

use crate::auth::backend::build_client;
use crate::auth::{
    AuthError, AuthenticatedClient, CredentialExchange, HttpIdentityBackend, IdentityBackend,
    RefreshCoordinator,
};
use crate::config::ConfigV1;
use crate::guard::RouteGuard;
use crate::metrics::Metrics;
use crate::store::{SessionCookie, SessionStore};

/// Application state shared across all HTTP handlers.
///
/// The refresh coordinator lives here, one per process, so concurrent
/// requests carrying the same session cookie share a single refresh.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigV1>,
    pub credentials: Arc<CredentialExchange>,
    pub coordinator: Arc<RefreshCoordinator>,
    /// Session cookie codec.
    pub cookies: Arc<SessionCookie>,
    pub guard: Arc<RouteGuard>,
    /// Client for forwarded API calls.
    pub http: reqwest::Client,
    pub metrics: Metrics,
}

impl AppState {
    pub fn from_config(config: Arc<ConfigV1>) -> Result<Self, AuthError> {
        let backend = Arc::new(HttpIdentityBackend::new(&config.backend)?);
        Self::with_backend(config, backend)
    }

    pub fn with_backend(
        config: Arc<ConfigV1>,
        backend: Arc<dyn IdentityBackend>,
    ) -> Result<Self, AuthError> {
        let metrics = Metrics::new();
        let max_age = chrono::Duration::seconds(config.session.max_age_secs);

        Ok(AppState {
            credentials: Arc::new(CredentialExchange::new(
                backend.clone(),
                max_age,
                metrics.clone(),
            )),
            coordinator: Arc::new(RefreshCoordinator::new(
                backend,
                config.session.refresh_reuse_secs,
                metrics.clone(),
            )),
            cookies: Arc::new(SessionCookie::new(&config.session)),
            guard: Arc::new(RouteGuard::new(&config.routes)),
            http: build_client(&config.backend)?,
            metrics,
            config,
        })
    }

    /// A request authenticator bound to one request's session store.
    pub fn client_for(&self, store: Arc<SessionStore>) -> AuthenticatedClient {
        AuthenticatedClient::new(
            self.http.clone(),
            self.config.backend.clone(),
            self.coordinator.clone(),
            store,
            self.metrics.clone(),
        )
    }
}
