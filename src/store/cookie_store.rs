use std::sync::{Arc, Mutex, PoisonError};

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::SessionPersistence;
use crate::auth::AuthError;
use crate::config::SessionConfig;
use crate::models::Session;

#[derive(Serialize, Deserialize)]
struct CookieClaims {
    #[serde(flatten)]
    session: Session,
    iat: i64,
    exp: i64,
}

/// A session read back from a valid cookie.
#[derive(Debug, Clone)]
pub struct DecodedCookie {
    pub session: Session,
    /// When the cookie was signed, epoch seconds.
    pub issued_at: i64,
}

/// Signs and verifies the session cookie.
pub struct SessionCookie {
    name: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age_secs: i64,
    update_age_secs: i64,
    secure: bool,
}

impl SessionCookie {
    pub fn new(config: &SessionConfig) -> Self {
        SessionCookie {
            name: config.cookie_name.clone(),
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            max_age_secs: config.max_age_secs,
            update_age_secs: config.update_age_secs,
            secure: config.secure_cookies,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_age_secs)
    }

    pub fn encode(&self, session: &Session, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = CookieClaims {
            session: session.clone(),
            iat,
            exp: iat + self.max_age_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Config(format!("Failed to sign session cookie: {}", e)))
    }

    /// Verify and open a cookie value. Bad signatures and expired cookies yield `None`.
    pub fn decode(&self, value: &str) -> Option<DecodedCookie> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        match decode::<CookieClaims>(value, &self.decoding_key, &validation) {
            Ok(data) => Some(DecodedCookie {
                session: data.claims.session,
                issued_at: data.claims.iat,
            }),
            Err(e) => {
                debug!("Rejecting session cookie: {}", e);
                None
            }
        }
    }

    /// Whether an otherwise unchanged cookie is old enough to be re-signed.
    pub fn needs_reissue(&self, issued_at: i64, now: DateTime<Utc>) -> bool {
        now.timestamp() - issued_at >= self.update_age_secs
    }

    pub fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.name.clone(), value))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::seconds(self.max_age_secs))
            .secure(self.secure)
            .build()
    }

    /// The cookie to hand to `CookieJar::remove`; path must match the one set.
    pub fn removal(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), "")).path("/").build()
    }
}

/// Cookie change staged for the response currently being built.
#[derive(Debug, Clone)]
pub enum PendingCookie {
    Write(Cookie<'static>),
    Remove,
}

/// Persists a request's session as a signed cookie on the way out.
pub struct CookiePersistence {
    codec: Arc<SessionCookie>,
    pending: Mutex<Option<PendingCookie>>,
}

impl CookiePersistence {
    pub fn new(codec: Arc<SessionCookie>) -> Self {
        CookiePersistence {
            codec,
            pending: Mutex::new(None),
        }
    }

    /// The last staged change, if any. Later writes replace earlier ones.
    pub fn take_pending(&self) -> Option<PendingCookie> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn stage(&self, change: PendingCookie) {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(change);
    }
}

impl SessionPersistence for CookiePersistence {
    fn save(&self, session: &Session) {
        match self.codec.encode(session, Utc::now()) {
            Ok(value) => self.stage(PendingCookie::Write(self.codec.cookie(value))),
            Err(e) => {
                error!(session_id = %session.id, "{}", e);
                self.stage(PendingCookie::Remove);
            }
        }
    }

    fn remove(&self) {
        self.stage(PendingCookie::Remove);
    }
}
