use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the identity/API backend lives and how long we wait for it.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct BackendConfig {
    /// Base URL of the backend identity/API service, e.g. `https://api.example.com/api`.
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Timeout applied to every backend call, login and refresh included.
    #[serde(default = "default_timeout_in_ms")]
    pub timeout_in_ms: u64,
}

fn default_login_path() -> String {
    "/auth/login".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_timeout_in_ms() -> u64 {
    5000
}

impl BackendConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("backend.base_url is required".to_string());
        }
        match reqwest::Url::parse(&self.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => {
                return Err(format!(
                    "backend.base_url must use http or https, got '{}'",
                    url.scheme()
                ))
            }
            Err(e) => return Err(format!("backend.base_url is not a valid URL: {}", e)),
        }
        for (name, path) in [
            ("backend.login_path", &self.login_path),
            ("backend.refresh_path", &self.refresh_path),
        ] {
            if !path.starts_with('/') {
                return Err(format!("{} must start with '/'", name));
            }
        }
        if self.timeout_in_ms == 0 {
            return Err("backend.timeout_in_ms must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Joins `path` onto the base URL without doubling the slash.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
