use crate::middleware::{auth_middleware, AuthConfig};
use crate::runner::OperationRunner;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    middleware as axum_mw,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use toolbridge_mcp::{Operation, OperationResult};
use tracing::{info, warn};
use uuid::Uuid;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state.
pub struct AppState {
    /// Serves every `/mcp/*` request.
    pub runner: Arc<dyn OperationRunner>,
}

/// Body of `POST /mcp/call`.
#[derive(Debug, Deserialize)]
pub struct CallRequest {
    /// Capability to invoke; required.
    pub name: Option<String>,
    /// Arguments object; absent or `null` means `{}`.
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway without authentication.
    pub fn build(runner: Arc<dyn OperationRunner>) -> Router {
        Self::build_with_auth(runner, AuthConfig::default())
    }

    /// Build the gateway; `/mcp/*` routes require an API key when `auth` has any.
    /// `/health` is always open.
    pub fn build_with_auth(runner: Arc<dyn OperationRunner>, auth: AuthConfig) -> Router {
        let state = Arc::new(AppState { runner });

        let mut api = Router::new()
            .route("/mcp/tools", get(list_tools_handler))
            .route("/mcp/call", post(call_tool_handler));

        if auth.is_enabled() {
            api = api.route_layer(axum_mw::from_fn_with_state(Arc::new(auth), auth_middleware));
        }

        Router::new()
            .route("/health", get(health_handler))
            .merge(api)
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .with_state(state)
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"ok": true, "service": "toolbridge"}))
}

async fn list_tools_handler(State(state): State<Arc<AppState>>) -> Response {
    let request_id = Uuid::new_v4();
    info!(request_id = %request_id, "GET /mcp/tools");
    render(request_id, state.runner.run(Operation::ListCapabilities).await)
}

async fn call_tool_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CallRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4();

    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(request_id = %request_id, error = %rejection.body_text(), "Rejected call body");
            return client_error(&rejection.body_text());
        }
    };

    let name = match req.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => return client_error("name required"),
    };

    let arguments = match req.arguments {
        None | Some(serde_json::Value::Null) => serde_json::Map::new(),
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => return client_error("arguments must be an object"),
    };

    info!(request_id = %request_id, capability = %name, "POST /mcp/call");
    render(
        request_id,
        state.runner.run(Operation::invoke(name, arguments)).await,
    )
}

fn render(request_id: Uuid, result: OperationResult) -> Response {
    match result {
        Ok(output) => (StatusCode::OK, Json(output.into_value())).into_response(),
        Err(failure) => {
            warn!(
                request_id = %request_id,
                origin = %failure.origin,
                error = %failure.message,
                "Worker operation failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": failure.message,
                    "origin": failure.origin,
                })),
            )
                .into_response()
        }
    }
}

fn client_error(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
