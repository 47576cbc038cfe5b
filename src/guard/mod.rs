//! Page-level access decisions.
//!
//! The guard only classifies a navigation and picks a decision; the HTTP
//! layer in `routes::middleware` turns the decision into a redirect.

use crate::config::RoutesConfig;
use crate::models::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Static bundles, assets and identity callbacks; never gated.
    Bypass,
    /// Gateway API; handlers answer 401 themselves.
    Api,
    /// Pages only meaningful to signed-out users.
    Auth,
    Public,
    Onboarding,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Authenticated { is_first_login: bool },
    Unauthenticated,
}

impl SessionState {
    /// An errored session counts as signed out.
    pub fn of(session: Option<&Session>) -> Self {
        match session {
            Some(s) if !s.is_errored() => SessionState::Authenticated {
                is_first_login: s.user.is_first_login,
            },
            _ => SessionState::Unauthenticated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToSignIn { location: String },
    RedirectToEntry { location: String },
    RedirectToOnboarding { location: String },
}

impl GuardDecision {
    pub fn location(&self) -> Option<&str> {
        match self {
            GuardDecision::Allow => None,
            GuardDecision::RedirectToSignIn { location }
            | GuardDecision::RedirectToEntry { location }
            | GuardDecision::RedirectToOnboarding { location } => Some(location),
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            GuardDecision::Allow => "allow",
            GuardDecision::RedirectToSignIn { .. } => "redirect_sign_in",
            GuardDecision::RedirectToEntry { .. } => "redirect_entry",
            GuardDecision::RedirectToOnboarding { .. } => "redirect_onboarding",
        }
    }
}

pub struct RouteGuard {
    routes: RoutesConfig,
}

impl RouteGuard {
    pub fn new(routes: &RoutesConfig) -> Self {
        RouteGuard {
            routes: routes.clone(),
        }
    }

    pub fn sign_in_path(&self) -> &str {
        &self.routes.sign_in_path
    }

    pub fn classify(&self, path: &str) -> RouteKind {
        if self
            .routes
            .bypass_prefixes
            .iter()
            .any(|prefix| under(path, prefix))
            || is_static_asset(path)
        {
            return RouteKind::Bypass;
        }
        if under(path, &self.routes.api_prefix) {
            return RouteKind::Api;
        }
        if self.routes.auth_routes.iter().any(|r| r == path) {
            return RouteKind::Auth;
        }
        if self.routes.public_routes.iter().any(|r| r == path) {
            return RouteKind::Public;
        }
        if under(path, &self.routes.onboarding_path) {
            return RouteKind::Onboarding;
        }
        RouteKind::Protected
    }

    /// Decide what to do with a navigation to `path` (plus its raw `query`).
    pub fn evaluate(&self, path: &str, query: Option<&str>, state: SessionState) -> GuardDecision {
        match (self.classify(path), state) {
            (RouteKind::Bypass | RouteKind::Api | RouteKind::Public, _) => GuardDecision::Allow,
            (RouteKind::Auth, SessionState::Authenticated { .. }) => GuardDecision::RedirectToEntry {
                location: self.routes.authenticated_entry_path.clone(),
            },
            (RouteKind::Auth, SessionState::Unauthenticated) => GuardDecision::Allow,
            (RouteKind::Onboarding | RouteKind::Protected, SessionState::Unauthenticated) => {
                GuardDecision::RedirectToSignIn {
                    location: self.sign_in_location(path, query),
                }
            }
            (
                RouteKind::Protected,
                SessionState::Authenticated {
                    is_first_login: true,
                },
            ) => GuardDecision::RedirectToOnboarding {
                location: self.routes.onboarding_path.clone(),
            },
            (RouteKind::Onboarding | RouteKind::Protected, SessionState::Authenticated { .. }) => {
                GuardDecision::Allow
            }
        }
    }

    fn sign_in_location(&self, path: &str, query: Option<&str>) -> String {
        let target = match query {
            Some(q) if !q.is_empty() => format!("{}?{}", path, q),
            _ => path.to_string(),
        };
        format!(
            "{}?{}={}",
            self.routes.sign_in_path,
            self.routes.callback_param,
            urlencoding::encode(&target)
        )
    }
}

/// `path` equals `prefix` or lies below it.
fn under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn is_static_asset(path: &str) -> bool {
    path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED_IN: SessionState = SessionState::Authenticated {
        is_first_login: false,
    };
    const FIRST_LOGIN: SessionState = SessionState::Authenticated {
        is_first_login: true,
    };

    fn guard() -> RouteGuard {
        RouteGuard::new(&RoutesConfig::default())
    }

    #[test]
    fn test_classification() {
        let guard = guard();
        assert_eq!(guard.classify("/_next/static/chunk.js"), RouteKind::Bypass);
        assert_eq!(guard.classify("/api/auth/session"), RouteKind::Bypass);
        assert_eq!(guard.classify("/favicon.ico"), RouteKind::Bypass);
        assert_eq!(guard.classify("/main/logo.svg"), RouteKind::Bypass);
        assert_eq!(guard.classify("/api/backend/jobs"), RouteKind::Api);
        assert_eq!(guard.classify("/api/authors"), RouteKind::Api);
        assert_eq!(guard.classify("/sign-in"), RouteKind::Auth);
        assert_eq!(guard.classify("/reset-password"), RouteKind::Auth);
        assert_eq!(guard.classify("/"), RouteKind::Public);
        assert_eq!(guard.classify("/landing"), RouteKind::Public);
        assert_eq!(guard.classify("/onboarding/step-2"), RouteKind::Onboarding);
        assert_eq!(guard.classify("/onboardingx"), RouteKind::Protected);
        assert_eq!(guard.classify("/main/dashboard"), RouteKind::Protected);
    }

    #[test]
    fn test_signed_out_dashboard_goes_to_sign_in_with_callback() {
        let decision = guard().evaluate("/main/dashboard", None, SessionState::Unauthenticated);
        assert_eq!(
            decision,
            GuardDecision::RedirectToSignIn {
                location: "/sign-in?callbackUrl=%2Fmain%2Fdashboard".to_string()
            }
        );
    }

    #[test]
    fn test_callback_keeps_query() {
        let decision = guard().evaluate(
            "/main/jobs",
            Some("page=2&q=rust dev"),
            SessionState::Unauthenticated,
        );
        assert_eq!(
            decision.location(),
            Some("/sign-in?callbackUrl=%2Fmain%2Fjobs%3Fpage%3D2%26q%3Drust%20dev")
        );
    }

    #[test]
    fn test_first_login_goes_to_onboarding() {
        let guard = guard();
        assert_eq!(
            guard.evaluate("/main/dashboard", None, FIRST_LOGIN),
            GuardDecision::RedirectToOnboarding {
                location: "/onboarding".to_string()
            }
        );
        assert_eq!(guard.evaluate("/onboarding", None, FIRST_LOGIN), GuardDecision::Allow);
    }

    #[test]
    fn test_signed_in_user_leaves_auth_pages() {
        let guard = guard();
        for page in ["/sign-in", "/sign-up", "/forgot-password"] {
            assert_eq!(
                guard.evaluate(page, None, SIGNED_IN),
                GuardDecision::RedirectToEntry {
                    location: "/main/dashboard".to_string()
                }
            );
            assert_eq!(
                guard.evaluate(page, None, SessionState::Unauthenticated),
                GuardDecision::Allow
            );
        }
    }

    #[test]
    fn test_open_routes_are_always_allowed() {
        let guard = guard();
        for state in [SessionState::Unauthenticated, SIGNED_IN, FIRST_LOGIN] {
            assert_eq!(guard.evaluate("/", None, state), GuardDecision::Allow);
            assert_eq!(guard.evaluate("/static/app.css", None, state), GuardDecision::Allow);
            assert_eq!(guard.evaluate("/api/backend/jobs", None, state), GuardDecision::Allow);
        }
    }

    #[test]
    fn test_signed_in_user_reaches_protected_pages() {
        assert_eq!(
            guard().evaluate("/main/dashboard", None, SIGNED_IN),
            GuardDecision::Allow
        );
    }

    #[test]
    fn test_errored_session_counts_as_signed_out() {
        let mut session = crate::testing::session_expiring_at(crate::testing::now_secs() + 60);
        assert_eq!(SessionState::of(Some(&session)), SIGNED_IN);

        session.mark_refresh_failed();
        assert_eq!(SessionState::of(Some(&session)), SessionState::Unauthenticated);
        assert_eq!(SessionState::of(None), SessionState::Unauthenticated);
    }
}
