#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use chrono::Utc;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use portalauth::auth::decoder;
use portalauth::config::{Config, ConfigV1};
use portalauth::models::{Session, TokenPair, UserIdentity};
use portalauth::routes::create_router;
use portalauth::state::AppState;
use serde_json::{json, Value};

pub const COOKIE_NAME: &str = "portal.session-token";

const TEST_CONFIG: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:0
logging:
  level: "debug"
  format: "json"
backend:
  base_url: "{base_url}"
  timeout_in_ms: 2000
session:
  secret: integration-test-secret
  secure_cookies: false
"#;

pub fn load_test_config(base_url: &str) -> ConfigV1 {
    let yaml = TEST_CONFIG.replace("{base_url}", base_url);
    let config: Config = Figment::new()
        .merge(Yaml::string(&yaml))
        .extract()
        .expect("Failed to parse test config YAML");

    match config {
        Config::ConfigV1(cfg) => cfg,
    }
}

pub fn build_app(base_url: &str) -> (Router, AppState) {
    let config = Arc::new(load_test_config(base_url));
    let state = AppState::from_config(config).expect("state should build");
    (create_router(state.clone()), state)
}

pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// An access token as the backend would issue it.
pub fn access_token(sub: &str, exp: i64) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": sub, "exp": exp, "type": "access", "username": sub }),
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("token should encode")
}

pub fn session(access: &str, refresh: &str, is_first_login: bool) -> Session {
    let decoded = decoder::decode(access).expect("token should decode");
    Session::new(
        UserIdentity::from_claims(&decoded, is_first_login),
        TokenPair::new(access.to_string(), refresh.to_string(), &decoded),
        Utc::now() + chrono::Duration::days(30),
    )
}

/// Signed cookie value for `session`, as the gateway would have set it.
pub fn cookie_for(state: &AppState, session: &Session) -> String {
    state
        .cookies
        .encode(session, Utc::now())
        .expect("cookie should encode")
}

pub fn request(method: Method, path: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(value) = cookie {
        builder = builder.header(header::COOKIE, format!("{}={}", COOKIE_NAME, value));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    };
    request.expect("failed to build request")
}

/// The raw `Set-Cookie` header for the session cookie, if any.
pub fn set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", COOKIE_NAME)))
        .map(str::to_string)
}

/// The session cookie value set by `response`; `None` when absent or removed.
pub fn cookie_value(response: &Response<Body>) -> Option<String> {
    let header = set_cookie(response)?;
    let pair = header.split(';').next()?;
    let value = pair.split_once('=')?.1;
    (!value.is_empty()).then(|| value.to_string())
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}
