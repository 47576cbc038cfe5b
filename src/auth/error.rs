/// Errors raised by the session subsystem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The backend rejected the username/password pair.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A required login field was empty; nothing was sent.
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    /// A token could not be parsed or lacked required claims.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The refresh token was rejected or the refresh call failed.
    #[error("RefreshAccessTokenError")]
    RefreshAccessToken,

    /// Transport failure talking to the backend.
    #[error("Network error: {0}")]
    Network(String),

    /// No usable session.
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Network(e.to_string())
    }
}
