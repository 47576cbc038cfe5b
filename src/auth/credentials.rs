use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::backend::IdentityBackend;
use super::decoder;
use super::error::AuthError;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{Session, TokenPair, UserIdentity};

/// Exchanges a username/password pair for an initial session.
pub struct CredentialExchange {
    backend: Arc<dyn IdentityBackend>,
    max_age: chrono::Duration,
    metrics: Metrics,
}

impl CredentialExchange {
    pub fn new(backend: Arc<dyn IdentityBackend>, max_age: chrono::Duration, metrics: Metrics) -> Self {
        CredentialExchange {
            backend,
            max_age,
            metrics,
        }
    }

    /// One login call, never retried and never refreshed. Persisting the
    /// returned session is up to the caller.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::MissingCredential("username"));
        }
        if password.trim().is_empty() {
            return Err(AuthError::MissingCredential("password"));
        }

        let result = self.exchange(username, password).await;
        let label = match &result {
            Ok(_) => "success",
            Err(AuthError::InvalidCredentials) => "invalid_credentials",
            Err(AuthError::Network(_)) => "network_error",
            Err(_) => "error",
        };
        self.metrics.record_login_attempt(label);
        result
    }

    async fn exchange(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let grant = self.backend.login(username, password).await?;

        let decoded = decoder::decode(&grant.access_token).map_err(|e| {
            warn!("Login returned an unusable access token: {}", e);
            e
        })?;

        let user = UserIdentity::from_claims(&decoded, grant.is_first_login);
        let tokens = TokenPair::new(grant.access_token, grant.refresh_token, &decoded);
        let session = Session::new(user, tokens, Utc::now() + self.max_age);

        info!(
            session_id = %session.id,
            subject = %session.user.id,
            is_first_login = session.user.is_first_login,
            "User signed in"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::backend::HttpIdentityBackend;
    use crate::config::BackendConfig;
    use crate::testing::{jwt, now_secs, FakeBackend};
    use mockito::Server;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn http_backend(url: String) -> Arc<dyn IdentityBackend> {
        Arc::new(
            HttpIdentityBackend::new(&BackendConfig {
                base_url: url,
                login_path: "/auth/login".to_string(),
                refresh_path: "/auth/refresh".to_string(),
                timeout_in_ms: 2000,
            })
            .unwrap(),
        )
    }

    fn exchange(backend: Arc<dyn IdentityBackend>) -> CredentialExchange {
        CredentialExchange::new(backend, chrono::Duration::days(30), Metrics::new())
    }

    #[tokio::test]
    async fn test_blank_fields_make_no_call() {
        let backend = Arc::new(FakeBackend::new(Duration::ZERO));
        let credentials = exchange(backend.clone());

        assert_eq!(
            credentials.login("", "pw").await.unwrap_err(),
            AuthError::MissingCredential("username")
        );
        assert_eq!(
            credentials.login("anna", "   ").await.unwrap_err(),
            AuthError::MissingCredential("password")
        );
        assert_eq!(backend.login_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_builds_session_from_token() {
        let exp = now_secs() + 900;
        let access = jwt("17", exp);
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"access_token": "{}", "refresh_token": "r1", "is_first_login": true}}"#,
                access
            ))
            .expect(1)
            .create_async()
            .await;

        let session = exchange(http_backend(server.url()))
            .login("anna", "pw")
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(session.user.id, "17");
        assert!(session.user.is_first_login);
        assert_eq!(session.tokens.access_token, access);
        assert_eq!(session.tokens.refresh_token, "r1");
        assert_eq!(session.tokens.access_token_expires, exp * 1000);
        assert!(session.tokens.error.is_none());
        assert!(session.expires > Utc::now() + chrono::Duration::days(29));
    }

    #[tokio::test]
    async fn test_rejected_login_is_not_retried() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let err = exchange(http_backend(server.url()))
            .login("anna", "wrong")
            .await
            .unwrap_err();

        login.assert_async().await;
        refresh.assert_async().await;
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_undecodable_token_creates_no_session() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "opaque", "refresh_token": "r1"}"#)
            .create_async()
            .await;

        let err = exchange(http_backend(server.url()))
            .login("anna", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)));
    }
}
