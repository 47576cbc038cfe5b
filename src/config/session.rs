use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Session cookie settings.
///
/// `max_age_secs` bounds the lifetime of the cookie itself; `update_age_secs`
/// controls how often an unchanged cookie is reissued. Both are independent of
/// access-token refresh.
#[derive(Deserialize, Serialize, JsonSchema, Clone)]
pub struct SessionConfig {
    /// HS256 key used to sign the session cookie.
    pub secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: i64,
    #[serde(default = "default_update_age_secs")]
    pub update_age_secs: i64,
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
    /// How long a successful refresh is remembered for callers still holding
    /// the previous refresh token. Zero disables reuse.
    #[serde(default = "default_refresh_reuse_secs")]
    pub refresh_reuse_secs: u64,
}

/// Upper bound for `max_age_secs`: 400 days, the longest cookie lifetime
/// browsers honour.
pub const MAX_SESSION_AGE_SECS: i64 = 400 * 24 * 60 * 60;

fn default_cookie_name() -> String {
    "portal.session-token".to_string()
}

fn default_max_age_secs() -> i64 {
    30 * 24 * 60 * 60
}

fn default_update_age_secs() -> i64 {
    24 * 60 * 60
}

fn default_secure_cookies() -> bool {
    true
}

fn default_refresh_reuse_secs() -> u64 {
    10
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("session.secret is required".to_string());
        }
        if self.cookie_name.trim().is_empty() {
            return Err("session.cookie_name must not be empty".to_string());
        }
        if self.max_age_secs <= 0 || self.max_age_secs > MAX_SESSION_AGE_SECS {
            return Err(format!(
                "session.max_age_secs must be between 1 and {}",
                MAX_SESSION_AGE_SECS
            ));
        }
        if self.update_age_secs < 0 || self.update_age_secs > self.max_age_secs {
            return Err(
                "session.update_age_secs must be between 0 and session.max_age_secs".to_string(),
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("cookie_name", &self.cookie_name)
            .field("max_age_secs", &self.max_age_secs)
            .field("update_age_secs", &self.update_age_secs)
            .field("secure_cookies", &self.secure_cookies)
            .field("refresh_reuse_secs", &self.refresh_reuse_secs)
            .finish()
    }
}
