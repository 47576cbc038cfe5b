//! Test helpers shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use crate::auth::backend::{IdentityBackend, LoginGrant, RefreshGrant};
use crate::auth::decoder;
use crate::auth::AuthError;
use crate::models::{Session, TokenPair, UserIdentity};
use crate::store::SessionStore;

const SIGNING_KEY: &[u8] = b"backend-signing-key";

/// Mint an access token with `sub` and `exp` claims.
pub fn jwt(sub: &str, exp: i64) -> String {
    jwt_with_claims(json!({ "sub": sub, "exp": exp, "type": "access" }))
}

pub fn jwt_with_claims(claims: Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SIGNING_KEY),
    )
    .expect("test token should encode")
}

pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// A session whose access token expires at `exp` (epoch seconds).
pub fn session_expiring_at(exp: i64) -> Session {
    let access = jwt("42", exp);
    let decoded = decoder::decode(&access).expect("test token should decode");
    Session::new(
        UserIdentity::from_claims(&decoded, false),
        TokenPair::new(access, "refresh-0".to_string(), &decoded),
        Utc::now() + chrono::Duration::days(30),
    )
}

pub fn expired_store() -> Arc<SessionStore> {
    Arc::new(SessionStore::in_memory(Some(session_expiring_at(
        now_secs() - 60,
    ))))
}

/// Counting [`IdentityBackend`] that answers after a delay.
///
/// Each successful refresh hands out `access-N` / `refresh-N` tokens where
/// `N` is the call number, so tests can tell results apart. Without rotation
/// the refresh token is left out of the answer.
pub struct FakeBackend {
    pub refresh_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    delay: Duration,
    fail_refresh: bool,
    first_login_on_refresh: Option<bool>,
    rotate_refresh_token: bool,
    token_lifetime_secs: i64,
}

impl FakeBackend {
    pub fn new(delay: Duration) -> Self {
        FakeBackend {
            refresh_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            delay,
            fail_refresh: false,
            first_login_on_refresh: None,
            rotate_refresh_token: true,
            token_lifetime_secs: 3600,
        }
    }

    pub fn failing(delay: Duration) -> Self {
        FakeBackend {
            fail_refresh: true,
            ..Self::new(delay)
        }
    }

    pub fn with_first_login(mut self, flag: bool) -> Self {
        self.first_login_on_refresh = Some(flag);
        self
    }

    /// Answer refreshes without a new refresh token.
    pub fn without_rotation(mut self) -> Self {
        self.rotate_refresh_token = false;
        self
    }

    /// Lifetime of issued access tokens; negative values issue expired ones.
    pub fn with_token_lifetime(mut self, secs: i64) -> Self {
        self.token_lifetime_secs = secs;
        self
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityBackend for FakeBackend {
    fn get_name(&self) -> &str {
        "fake"
    }

    async fn login(&self, username: &str, _password: &str) -> Result<LoginGrant, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(LoginGrant {
            access_token: jwt(username, now_secs() + 3600),
            refresh_token: "refresh-0".to_string(),
            is_first_login: false,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshGrant, AuthError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.fail_refresh {
            return Err(AuthError::RefreshAccessToken);
        }
        Ok(RefreshGrant {
            access_token: jwt_with_claims(json!({
                "sub": "42",
                "exp": now_secs() + self.token_lifetime_secs,
                "type": "access",
                "jti": format!("access-{}", n),
            })),
            refresh_token: self
                .rotate_refresh_token
                .then(|| format!("refresh-{}", n)),
            is_first_login: self.first_login_on_refresh,
        })
    }
}
