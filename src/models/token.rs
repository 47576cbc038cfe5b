use serde::{Deserialize, Serialize};

use crate::auth::decoder::DecodedToken;

/// Tag placed on a session whose refresh token was rejected.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    RefreshAccessTokenError,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::RefreshAccessTokenError => f.write_str("RefreshAccessTokenError"),
        }
    }
}

/// The access/refresh token pair issued by the identity backend.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch milliseconds, always `exp * 1000` of `access_token`.
    pub access_token_expires: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SessionError>,
}

impl TokenPair {
    /// Builds a pair whose expiry comes from the decoded access token.
    pub fn new(access_token: String, refresh_token: String, decoded: &DecodedToken) -> Self {
        TokenPair {
            access_token,
            refresh_token,
            access_token_expires: decoded.expires_at.saturating_mul(1000),
            error: None,
        }
    }

    /// `now < accessTokenExpires`; equality counts as expired.
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        now_millis < self.access_token_expires
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("access_token_expires", &self.access_token_expires)
            .field("error", &self.error)
            .finish()
    }
}

/// The settled result of one refresh call, handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub tokens: TokenPair,
    /// Present when the backend reports the onboarding flag on refresh.
    pub is_first_login: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(exp: i64) -> DecodedToken {
        DecodedToken {
            subject: "42".to_string(),
            expires_at: exp,
            username: None,
            email: None,
            roles: Vec::new(),
        }
    }

    #[test]
    fn test_expiry_is_derived_from_exp_claim() {
        let pair = TokenPair::new("a".into(), "r".into(), &decoded(1_700_000_000));
        assert_eq!(pair.access_token_expires, 1_700_000_000_000);
        assert!(pair.error.is_none());
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let pair = TokenPair::new("a".into(), "r".into(), &decoded(1_700_000_000));
        assert!(pair.is_valid_at(1_699_999_999_999));
        assert!(!pair.is_valid_at(1_700_000_000_000));
        assert!(!pair.is_valid_at(1_700_000_000_001));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = TokenPair::new("secret-access".into(), "secret-refresh".into(), &decoded(1));
        let rendered = format!("{:?}", pair);
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[test]
    fn test_error_tag_serializes_as_plain_string() {
        let mut pair = TokenPair::new("a".into(), "r".into(), &decoded(1));
        pair.error = Some(SessionError::RefreshAccessTokenError);
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["error"], "RefreshAccessTokenError");
        assert_eq!(json["accessTokenExpires"], 1000);
    }
}
