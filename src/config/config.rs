use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::backend::BackendConfig;
use super::logging::LoggingConfig;
use super::routes::RoutesConfig;
use super::session::SessionConfig;

/// Default location of the YAML configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";
/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "PORTALAUTH_CONFIG";
/// Prefix for environment overrides, e.g. `PORTALAUTH_SESSION__SECRET`.
pub const ENV_PREFIX: &str = "PORTALAUTH_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct ConfigV1 {
    pub bind_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub backend: BackendConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
}

impl ConfigV1 {
    /// Checks the settings the gateway cannot start without.
    pub fn validate(&self) -> Result<(), String> {
        self.backend.validate()?;
        self.session.validate()?;
        self.routes.validate()?;
        Ok(())
    }
}

/// Extract and validate a configuration from an already assembled figment.
pub fn extract_config(figment: Figment) -> Result<ConfigV1, String> {
    let config = match figment.extract::<Config>() {
        Ok(Config::ConfigV1(c)) => c,
        Err(e) => return Err(e.to_string()),
    };
    config.validate()?;
    Ok(config)
}

/// Load config from the YAML file (default `./config.yaml`) with
/// `PORTALAUTH_*` environment overrides. Any error here is fatal.
pub fn load_config() -> ConfigV1 {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let figment = Figment::new()
        .merge(Yaml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"));

    match extract_config(figment) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration from '{}': {}", path, e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to render schema: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:3000
backend:
  base_url: http://identity.internal/api
session:
  secret: test-session-secret
"#;

    fn figment(yaml: &str) -> Figment {
        Figment::new().merge(Yaml::string(yaml))
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = extract_config(figment(MINIMAL)).expect("minimal config should load");

        assert_eq!(config.backend.login_path, "/auth/login");
        assert_eq!(config.backend.refresh_path, "/auth/refresh");
        assert_eq!(config.session.max_age_secs, 30 * 24 * 60 * 60);
        assert_eq!(config.session.update_age_secs, 24 * 60 * 60);
        assert_eq!(config.routes.sign_in_path, "/sign-in");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let yaml = r#"
version: "1.0.0"
bind_address: 127.0.0.1:3000
backend:
  base_url: http://identity.internal/api
session:
  secret: ""
"#;
        let err = extract_config(figment(yaml)).unwrap_err();
        assert!(err.contains("session.secret"), "unexpected error: {}", err);
    }

    #[test]
    fn test_missing_backend_section_is_fatal() {
        let yaml = r#"
version: "1.0.0"
bind_address: 127.0.0.1:3000
session:
  secret: abc
"#;
        assert!(extract_config(figment(yaml)).is_err());
    }

    #[test]
    fn test_invalid_base_url_is_fatal() {
        let yaml = MINIMAL.replace("http://identity.internal/api", "not a url");
        let err = extract_config(figment(&yaml)).unwrap_err();
        assert!(err.contains("backend.base_url"), "unexpected error: {}", err);
    }

    #[test]
    fn test_oversized_max_age_is_fatal() {
        let yaml = format!("{}  max_age_secs: 9223372036854775807\n", MINIMAL);
        let err = extract_config(figment(&yaml)).unwrap_err();
        assert!(err.contains("session.max_age_secs"), "unexpected error: {}", err);

        let yaml = format!("{}  max_age_secs: 34560000\n", MINIMAL);
        assert!(extract_config(figment(&yaml)).is_ok());
    }

    #[test]
    fn test_env_overrides_yaml() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PORTALAUTH_SESSION__SECRET", "from-env");
            jail.set_env("PORTALAUTH_BACKEND__TIMEOUT_IN_MS", "1500");
            let config = extract_config(
                figment(MINIMAL).merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__")),
            )
            .expect("config should load");
            assert_eq!(config.session.secret, "from-env");
            assert_eq!(config.backend.timeout_in_ms, 1500);
            Ok(())
        });
    }
}
