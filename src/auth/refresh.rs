//! Single-flight refresh of expired access tokens.
//!
//! Calls are keyed by refresh token. The first caller that needs a refresh
//! for a key becomes its owner and talks to the backend; everyone else who
//! shows up while that call is outstanding parks a oneshot receiver and gets
//! the owner's result. The owner writes the store before releasing anyone.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use cached::{Cached, TimedCache};
use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::backend::IdentityBackend;
use super::decoder;
use super::error::AuthError;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{RefreshedTokens, Session, TokenPair};
use crate::store::SessionStore;

type Outcome = Result<RefreshedTokens, AuthError>;

struct Flights {
    in_flight: HashMap<String, Vec<oneshot::Sender<Outcome>>>,
    /// Recent results by the refresh token they replaced.
    recent: Option<TimedCache<String, RefreshedTokens>>,
}

#[derive(Clone, Copy)]
enum Trigger<'a> {
    /// Refresh only if the stored access token has expired.
    Expired,
    /// The backend rejected this access token.
    Rejected(&'a str),
    /// Refresh regardless, skipping remembered results.
    Forced,
}

enum Role {
    Current(Session),
    Reused(String, RefreshedTokens),
    Waiter(String, oneshot::Receiver<Outcome>),
    Owner(Session),
}

/// Coordinates token refreshes so that one refresh token is spent at most once at a time.
pub struct RefreshCoordinator {
    backend: Arc<dyn IdentityBackend>,
    flights: Mutex<Flights>,
    metrics: Metrics,
}

impl RefreshCoordinator {
    /// `reuse_secs` is how long a result stays available to callers still
    /// holding the replaced refresh token; zero disables it.
    pub fn new(backend: Arc<dyn IdentityBackend>, reuse_secs: u64, metrics: Metrics) -> Self {
        let recent = (reuse_secs > 0).then(|| TimedCache::with_lifespan(reuse_secs));
        RefreshCoordinator {
            backend,
            flights: Mutex::new(Flights {
                in_flight: HashMap::new(),
                recent,
            }),
            metrics,
        }
    }

    /// The stored session, refreshed first if its access token has expired.
    pub async fn ensure_fresh(&self, store: &SessionStore) -> Result<Session, AuthError> {
        self.run(store, Trigger::Expired).await
    }

    /// Refresh after the backend answered 401 to `rejected_access_token`,
    /// unless the store already moved on to another token.
    pub async fn refresh_rejected(
        &self,
        store: &SessionStore,
        rejected_access_token: &str,
    ) -> Result<Session, AuthError> {
        self.run(store, Trigger::Rejected(rejected_access_token))
            .await
    }

    /// Refresh even if the current token is still valid.
    pub async fn refresh_now(&self, store: &SessionStore) -> Result<Session, AuthError> {
        self.run(store, Trigger::Forced).await
    }

    async fn run(&self, store: &SessionStore, trigger: Trigger<'_>) -> Result<Session, AuthError> {
        loop {
            match self.join(store, trigger)? {
                Role::Current(session) => return Ok(session),
                Role::Reused(key, refreshed) => {
                    debug!("Reusing a refresh that completed moments ago");
                    self.metrics.record_refresh_coalesced("recent");
                    apply(store, &key, &Ok(refreshed));
                    return current(store);
                }
                Role::Waiter(key, rx) => match rx.await {
                    Ok(outcome) => {
                        if outcome.is_ok() {
                            self.metrics.record_refresh_coalesced("waiter");
                        }
                        apply(store, &key, &outcome);
                        outcome?;
                        return current(store);
                    }
                    Err(_) => {
                        debug!("Refresh owner went away, retrying");
                        continue;
                    }
                },
                Role::Owner(session) => return self.own(store, session).await,
            }
        }
    }

    /// Decide, under the lock, what this caller does. The store is read
    /// inside the critical section so a caller either sees the owner's
    /// write or finds the flight still registered.
    fn join(&self, store: &SessionStore, trigger: Trigger<'_>) -> Result<Role, AuthError> {
        let mut flights = self.lock();

        let session = store.get().ok_or(AuthError::Unauthenticated)?;
        if session.is_errored() {
            return Err(AuthError::RefreshAccessToken);
        }

        match trigger {
            Trigger::Expired if session.is_valid_at(Utc::now().timestamp_millis()) => {
                return Ok(Role::Current(session));
            }
            Trigger::Rejected(token) if session.tokens.access_token != token => {
                return Ok(Role::Current(session));
            }
            _ => {}
        }

        let key = session.tokens.refresh_token.clone();
        if let Some(waiters) = flights.in_flight.get_mut(&key) {
            let (tx, rx) = oneshot::channel();
            waiters.push(tx);
            return Ok(Role::Waiter(key, rx));
        }

        if !matches!(trigger, Trigger::Forced) {
            if let Some(recent) = flights.recent.as_mut() {
                // Only a newer, still valid pair stands in for a refresh.
                let now = Utc::now().timestamp_millis();
                let reusable = recent.cache_get(&key).filter(|hit| {
                    hit.tokens.access_token != session.tokens.access_token
                        && hit.tokens.is_valid_at(now)
                });
                if let Some(hit) = reusable {
                    return Ok(Role::Reused(key, hit.clone()));
                }
            }
        }

        flights.in_flight.insert(key, Vec::new());
        Ok(Role::Owner(session))
    }

    async fn own(&self, store: &SessionStore, session: Session) -> Result<Session, AuthError> {
        let key = session.tokens.refresh_token.clone();
        let flight = Flight {
            coordinator: self,
            key: Some(key.clone()),
        };

        info!(
            session_id = %session.id,
            subject = %session.user.id,
            "Refreshing access token"
        );
        let started = Instant::now();
        let outcome = self.call_backend(&key).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &outcome {
            Ok(_) => self.metrics.record_token_refresh("success", elapsed),
            Err(_) => self.metrics.record_token_refresh("failure", elapsed),
        }

        apply(store, &key, &outcome);
        let waiters = flight.settle(&outcome);

        match &outcome {
            Ok(_) => info!(session_id = %session.id, waiters, "Access token refreshed"),
            Err(e) => warn!(session_id = %session.id, waiters, "Access token refresh failed: {}", e),
        }

        outcome?;
        current(store)
    }

    async fn call_backend(&self, refresh_token: &str) -> Outcome {
        let grant = self.backend.refresh(refresh_token).await.map_err(|e| {
            warn!(backend = self.backend.get_name(), "Refresh call failed: {}", e);
            AuthError::RefreshAccessToken
        })?;

        let decoded = decoder::decode(&grant.access_token).map_err(|e| {
            warn!("Refresh returned an unusable access token: {}", e);
            AuthError::RefreshAccessToken
        })?;

        let refresh = grant
            .refresh_token
            .unwrap_or_else(|| refresh_token.to_string());
        Ok(RefreshedTokens {
            tokens: TokenPair::new(grant.access_token, refresh, &decoded),
            is_first_login: grant.is_first_login,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Flights> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    #[cfg(test)]
    fn recent_len(&self) -> usize {
        self.lock().recent.as_ref().map_or(0, |recent| recent.cache_size())
    }
}

/// Registration of an owned refresh. Dropping it unsettled releases the
/// waiters without a result so one of them takes over.
struct Flight<'a> {
    coordinator: &'a RefreshCoordinator,
    key: Option<String>,
}

impl Flight<'_> {
    /// Release every waiter with `outcome`. Returns how many there were.
    fn settle(mut self, outcome: &Outcome) -> usize {
        let Some(key) = self.key.take() else {
            return 0;
        };
        let waiters = {
            let mut flights = self.coordinator.lock();
            if let (Ok(refreshed), Some(recent)) = (outcome, flights.recent.as_mut()) {
                recent.flush();
                recent.cache_set(key.clone(), refreshed.clone());
            }
            flights.in_flight.remove(&key).unwrap_or_default()
        };
        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.coordinator.lock().in_flight.remove(&key);
        }
    }
}

/// Apply a refresh outcome to `store`, but only to the session that was refreshed.
fn apply(store: &SessionStore, key: &str, outcome: &Outcome) {
    store.update(|session| {
        if session.tokens.refresh_token != key {
            return false;
        }
        match outcome {
            Ok(refreshed) => session.apply_refresh(refreshed),
            Err(_) => session.mark_refresh_failed(),
        }
    });
}

fn current(store: &SessionStore) -> Result<Session, AuthError> {
    let session = store.get().ok_or(AuthError::Unauthenticated)?;
    if session.is_errored() {
        return Err(AuthError::RefreshAccessToken);
    }
    Ok(session)
}
