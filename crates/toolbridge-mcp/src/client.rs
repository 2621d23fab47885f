//! MCP session client: handshake, capability listing and invocation over a
//! [`StdioTransport`].

use crate::protocol::*;
use crate::transport::StdioTransport;
use std::sync::Arc;
use toolbridge_core::{BridgeError, BridgeResult, InvocationError};
use tracing::{debug, info};

/// Upper bound on `tools/list` pages followed for one listing.
const MAX_LIST_PAGES: usize = 64;

/// A protocol session established over one transport.
///
/// Only [`McpClient::connect`] creates a client, so the handshake runs
/// exactly once per session.
pub struct McpClient {
    transport: Arc<StdioTransport>,
    server: InitializeResult,
}

impl McpClient {
    /// Perform the `initialize` handshake and send `notifications/initialized`.
    ///
    /// Every failure, including the worker dying mid-handshake, is reported
    /// as [`BridgeError::Handshake`].
    pub async fn connect(transport: Arc<StdioTransport>, client: &ClientInfo) -> BridgeResult<Self> {
        let server = Self::initialize(&transport, client)
            .await
            .map_err(|e| match e {
                BridgeError::Handshake(_) => e,
                other => BridgeError::Handshake(other.to_string()),
            })?;

        let server_name = server
            .server_info
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or("unknown");
        info!(
            server = %server_name,
            version = %server.protocol_version,
            pid = ?transport.pid(),
            "MCP session initialized"
        );

        Ok(Self { transport, server })
    }

    async fn initialize(
        transport: &StdioTransport,
        client: &ClientInfo,
    ) -> BridgeResult<InitializeResult> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": client,
        });

        let resp = transport.request("initialize", Some(params)).await?;
        if let Some(err) = resp.error {
            return Err(BridgeError::Handshake(format!(
                "worker refused initialize ({}): {}",
                err.code, err.message
            )));
        }
        let result: InitializeResult = serde_json::from_value(
            resp.result
                .ok_or_else(|| BridgeError::Handshake("empty initialize result".into()))?,
        )
        .map_err(|e| BridgeError::Handshake(format!("failed to parse initialize result: {e}")))?;

        transport.notify("notifications/initialized", None).await?;
        Ok(result)
    }

    /// What the worker reported about itself during the handshake.
    pub fn server(&self) -> &InitializeResult {
        &self.server
    }

    /// List the worker's capabilities in the order it reports them,
    /// following `nextCursor` pagination.
    pub async fn list_capabilities(&self) -> BridgeResult<Vec<CapabilityDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));
            let result = self.call("tools/list", params).await?;
            let page: ListToolsPage = serde_json::from_value(result)
                .map_err(|e| BridgeError::Protocol(format!("failed to parse tools/list result: {e}")))?;

            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next.as_str()) => {
                    cursor = Some(next);
                }
                _ => {
                    debug!(count = tools.len(), "Capabilities listed");
                    return Ok(tools);
                }
            }
        }

        Err(BridgeError::Protocol(format!(
            "tools/list still paginating after {MAX_LIST_PAGES} pages"
        )))
    }

    /// Invoke capability `name` and return the worker's raw result object.
    ///
    /// The name is checked against the advertised catalog first; an unknown
    /// name fails without sending `tools/call`.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> BridgeResult<serde_json::Value> {
        let catalog = self.list_capabilities().await?;
        if !catalog.iter().any(|t| t.name == name) {
            return Err(InvocationError::UnknownCapability(name.to_string()).into());
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        let resp = self.transport.request("tools/call", Some(params)).await?;

        if let Some(err) = resp.error {
            if err.code == INVALID_PARAMS {
                return Err(InvocationError::Rejected(err.message).into());
            }
            return Err(BridgeError::Protocol(format!(
                "worker error {}: {}",
                err.code, err.message
            )));
        }

        let result = resp
            .result
            .ok_or_else(|| BridgeError::Protocol("empty tools/call result".into()))?;

        let outcome: McpToolResult = serde_json::from_value(result.clone())
            .map_err(|e| BridgeError::Protocol(format!("failed to parse tools/call result: {e}")))?;
        if outcome.is_error {
            let text = outcome.text();
            let reason = if text.is_empty() {
                format!("capability '{name}' reported an error")
            } else {
                text
            };
            return Err(InvocationError::Rejected(reason).into());
        }

        debug!(capability = %name, "Capability invoked");
        Ok(result)
    }

    async fn call(&self, method: &str, params: Option<serde_json::Value>) -> BridgeResult<serde_json::Value> {
        let resp = self.transport.request(method, params).await?;
        if let Some(err) = resp.error {
            return Err(BridgeError::Protocol(format!(
                "worker error {}: {}",
                err.code, err.message
            )));
        }
        resp.result
            .ok_or_else(|| BridgeError::Protocol(format!("empty {method} result")))
    }
}
