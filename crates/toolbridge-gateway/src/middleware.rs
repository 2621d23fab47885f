use axum::{
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::warn;

/// Auth configuration for the gateway.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// API keys that are allowed to call the worker. Empty = no auth required.
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    /// Accept exactly these keys; an empty list disables auth.
    pub fn new(api_keys: Vec<String>) -> Self {
        Self { api_keys }
    }

    /// Returns true if authentication is enabled (at least one key configured).
    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    fn accepts(&self, key: &str) -> bool {
        self.api_keys.iter().any(|k| k == key)
    }
}

/// `?api_key=` query parameter.
#[derive(serde::Deserialize, Default)]
pub struct AuthQuery {
    /// Key given in the query string.
    pub api_key: Option<String>,
}

/// Auth middleware: validates API key from header or query param.
///
/// Checks `Authorization: Bearer <key>` header first, then `?api_key=<key>` query param.
/// If no API keys are configured, all requests are allowed.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthConfig>>,
    headers: HeaderMap,
    query: Query<AuthQuery>,
    request: Request,
    next: Next,
) -> Response {
    if !auth.is_enabled() {
        return next.run(request).await;
    }

    let key_from_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let key = key_from_header.or_else(|| query.api_key.clone());

    match key {
        Some(k) if auth.accepts(&k) => next.run(request).await,
        Some(_) => {
            warn!(path = %request.uri().path(), "Rejected request: invalid API key");
            unauthorized("Invalid API key")
        }
        None => {
            warn!(path = %request.uri().path(), "Rejected request: missing API key");
            unauthorized("API key required")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_disabled() {
        let config = AuthConfig::new(vec![]);
        assert!(!config.is_enabled());
    }

    #[test]
    fn test_auth_config_enabled() {
        let config = AuthConfig::new(vec!["key123".to_string()]);
        assert!(config.is_enabled());
        assert!(config.accepts("key123"));
        assert!(!config.accepts("key12"));
    }
}
