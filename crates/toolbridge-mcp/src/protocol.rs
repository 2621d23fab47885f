//! MCP (Model Context Protocol) JSON-RPC 2.0 message types.
//!
//! Only the subset the bridge speaks is modelled: the `initialize`
//! handshake, `tools/list` and `tools/call`.

use serde::{Deserialize, Serialize};

/// Protocol revision sent in the `initialize` request.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC error code for invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;

/// JSON-RPC error code for a method the receiver does not implement.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Correlates the response with this request.
    pub id: u64,
    /// Method name, e.g. `tools/call`.
    pub method: String,
    /// Method parameters, omitted when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// A request with the given id.
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (a request without an id).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Notification name.
    pub method: String,
    /// Parameters; an empty object when none were given.
    pub params: serde_json::Value,
}

impl JsonRpcNotification {
    /// A notification; missing params become `{}`.
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params: params.unwrap_or_else(|| serde_json::json!({})),
        }
    }
}

/// An inbound JSON-RPC 2.0 message.
///
/// Responses carry an `id` and no `method`. Requests and notifications
/// initiated by the worker carry a `method` and are not answers to us.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol marker as sent by the worker.
    #[serde(default)]
    pub jsonrpc: String,
    /// Numeric for our requests; the worker may use strings for its own.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    /// Present only on worker-initiated messages.
    #[serde(default)]
    pub method: Option<String>,
    /// Success payload.
    pub result: Option<serde_json::Value>,
    /// Error payload.
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// The request id this message answers, if it is a response at all.
    pub fn response_id(&self) -> Option<u64> {
        if self.method.is_some() {
            None
        } else {
            self.id.as_ref().and_then(serde_json::Value::as_u64)
        }
    }

    /// Id and method of a request the worker expects us to answer.
    pub fn worker_request(&self) -> Option<(&serde_json::Value, &str)> {
        match (&self.id, &self.method) {
            (Some(id), Some(method)) if !id.is_null() => Some((id, method.as_str())),
            _ => None,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i64,
    /// Short description.
    pub message: String,
    /// Optional extra detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Our answer to a request initiated by the worker.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcReply {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// The worker's id, echoed verbatim.
    pub id: serde_json::Value,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcReply {
    /// Reply to a worker request: `ping` gets an empty result, every other
    /// method is answered with [`METHOD_NOT_FOUND`].
    pub fn for_worker_request(id: serde_json::Value, method: &str) -> Self {
        if method == "ping" {
            Self {
                jsonrpc: "2.0",
                id,
                result: Some(serde_json::json!({})),
                error: None,
            }
        } else {
            Self {
                jsonrpc: "2.0",
                id,
                result: None,
                error: Some(JsonRpcError {
                    code: METHOD_NOT_FOUND,
                    message: format!("Method not found: {method}"),
                    data: None,
                }),
            }
        }
    }
}

/// A capability advertised by the worker in a `tools/list` response.
///
/// Fields beyond name, description and schema are kept verbatim so they
/// reach HTTP clients unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CapabilityDescriptor {
    /// Name used to invoke the capability.
    pub name: String,
    /// Human-readable description; empty when the worker sent none.
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the arguments object.
    #[serde(default = "default_input_schema", rename = "inputSchema")]
    pub input_schema: serde_json::Value,
    /// Any other fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_input_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// One page of a `tools/list` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsPage {
    /// Capabilities on this page.
    #[serde(default)]
    pub tools: Vec<CapabilityDescriptor>,
    /// Cursor for the next page, absent on the last one.
    #[serde(default, rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// The parts of a `tools/call` result the bridge inspects.
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolResult {
    /// Content blocks.
    #[serde(default)]
    pub content: Vec<McpContent>,
    /// Set when the tool itself reports failure.
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl McpToolResult {
    /// All text content blocks joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// MCP content block.
#[derive(Debug, Clone, Deserialize)]
pub struct McpContent {
    /// Block type, e.g. `text` or `image`.
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text of a `text` block; empty for other types.
    #[serde(default)]
    pub text: String,
}

/// MCP server capabilities from the `initialize` response.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Tool support.
    #[serde(default)]
    pub tools: Option<serde_json::Value>,
    /// Resource support.
    #[serde(default)]
    pub resources: Option<serde_json::Value>,
    /// Prompt support.
    #[serde(default)]
    pub prompts: Option<serde_json::Value>,
}

/// MCP initialize response.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    /// Protocol revision the worker agreed to.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Advertised capabilities.
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Worker name and version, if reported.
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// Worker identity from the `initialize` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    /// Worker name.
    pub name: String,
    /// Worker version.
    #[serde(default)]
    pub version: String,
}

/// Identity the bridge announces during the handshake.
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "toolbridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
