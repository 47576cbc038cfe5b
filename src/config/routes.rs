use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Route classification used by the route guard.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
#[serde(default)]
pub struct RoutesConfig {
    /// Prefix of gateway API routes; these answer 401 instead of redirecting.
    pub api_prefix: String,
    pub sign_in_path: String,
    /// Where signed-in users land when they open an auth page.
    pub authenticated_entry_path: String,
    pub onboarding_path: String,
    /// Query parameter carrying the originally requested path to sign-in.
    pub callback_param: String,
    /// Pages only meaningful to signed-out users (sign-in, sign-up, ...).
    pub auth_routes: Vec<String>,
    /// Pages open to everyone.
    pub public_routes: Vec<String>,
    /// Path prefixes never gated (static bundles, identity callbacks).
    pub bypass_prefixes: Vec<String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        RoutesConfig {
            api_prefix: "/api".to_string(),
            sign_in_path: "/sign-in".to_string(),
            authenticated_entry_path: "/main/dashboard".to_string(),
            onboarding_path: "/onboarding".to_string(),
            callback_param: "callbackUrl".to_string(),
            auth_routes: vec![
                "/sign-in".to_string(),
                "/sign-up".to_string(),
                "/forgot-password".to_string(),
                "/reset-password".to_string(),
            ],
            public_routes: vec!["/".to_string(), "/landing".to_string()],
            bypass_prefixes: vec![
                "/_next".to_string(),
                "/static".to_string(),
                "/public".to_string(),
                "/images".to_string(),
                "/api/auth".to_string(),
            ],
        }
    }
}

impl RoutesConfig {
    pub fn validate(&self) -> Result<(), String> {
        let paths = [
            ("routes.api_prefix", &self.api_prefix),
            ("routes.sign_in_path", &self.sign_in_path),
            ("routes.authenticated_entry_path", &self.authenticated_entry_path),
            ("routes.onboarding_path", &self.onboarding_path),
        ];
        for (name, path) in paths {
            if !path.starts_with('/') {
                return Err(format!("{} must start with '/'", name));
            }
        }
        if self.api_prefix.trim_end_matches('/').is_empty() {
            return Err("routes.api_prefix must not be the root path".to_string());
        }
        if self.callback_param.trim().is_empty() {
            return Err("routes.callback_param must not be empty".to_string());
        }
        Ok(())
    }
}
