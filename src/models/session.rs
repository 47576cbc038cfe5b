use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::token::{RefreshedTokens, SessionError, TokenPair};
use super::user::UserIdentity;

/// A signed-in user's tokens and identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque id for log correlation only.
    pub id: Uuid,
    pub user: UserIdentity,
    pub tokens: TokenPair,
    /// Session-cookie watermark, unrelated to access-token expiry.
    pub expires: DateTime<Utc>,
}

/// What the UI gets to see of a session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientSession {
    pub user: UserIdentity,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
    pub expires: DateTime<Utc>,
}

impl Session {
    pub fn new(user: UserIdentity, tokens: TokenPair, expires: DateTime<Utc>) -> Self {
        Session {
            id: Uuid::new_v4(),
            user,
            tokens,
            expires,
        }
    }

    pub fn is_errored(&self) -> bool {
        self.tokens.error.is_some()
    }

    /// True when the access token can still be used at `now_millis`.
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        self.tokens.is_valid_at(now_millis)
    }

    /// Replace the token pair with a refresh result. Returns whether anything changed.
    pub fn apply_refresh(&mut self, refreshed: &RefreshedTokens) -> bool {
        let mut changed = false;
        if self.tokens != refreshed.tokens {
            self.tokens = refreshed.tokens.clone();
            changed = true;
        }
        if let Some(first) = refreshed.is_first_login {
            if self.user.is_first_login != first {
                self.user.is_first_login = first;
                changed = true;
            }
        }
        changed
    }

    /// Tag the session as unrecoverable. Returns false if it already was.
    pub fn mark_refresh_failed(&mut self) -> bool {
        if self.is_errored() {
            return false;
        }
        self.tokens.error = Some(SessionError::RefreshAccessTokenError);
        true
    }

    /// Copy with the expiry watermark pushed to `now + max_age`.
    pub fn renewed(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> Session {
        Session {
            expires: now + max_age,
            ..self.clone()
        }
    }

    pub fn client_view(&self) -> ClientSession {
        ClientSession {
            user: self.user.clone(),
            access_token: self.tokens.access_token.clone(),
            error: self.tokens.error,
            expires: self.expires,
        }
    }
}
