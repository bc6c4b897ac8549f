//! MCP message envelopes for the session handshake and tool calls.
//!
//! This server exposes only the `tools/*` surface of MCP — no resources,
//! no prompts — so these types cover exactly the initialize handshake and
//! the tool-call request/response shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::MCP_VERSION;

// ============================================================================
// INITIALIZE
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct InitializeRequest {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub capabilities: Option<Value>,
    #[serde(rename = "clientInfo", default)]
    pub client_info: Option<Value>,
}

impl Default for InitializeRequest {
    fn default() -> Self {
        Self { protocol_version: Some(MCP_VERSION.to_string()), capabilities: None, client_info: None }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub server_info: ServerInfo,
    pub capabilities: ServerCapabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// ============================================================================
// TOOLS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ToolResultContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self { content_type: "text".to_string(), text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<ToolResultContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Successful call: `content` is the pretty-printed JSON of whatever the
    /// handler returned.
    pub fn ok(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self { content: vec![ToolResultContent::text(text)], is_error: Some(false) }
    }

    /// A degraded-but-not-RPC-level error: an `EngineError` category other
    /// than permission/invalid-argument surfaces here as `isError: true`
    /// content instead of a top-level JSON-RPC error.
    pub fn failed(category: &str, message: impl Into<String>) -> Self {
        let payload = serde_json::json!({"category": category, "message": message.into()});
        Self { content: vec![ToolResultContent::text(payload.to_string())], is_error: Some(true) }
    }
}
