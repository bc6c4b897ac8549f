//! MCP JSON-RPC Types
//!
//! Core types for JSON-RPC 2.0 protocol used by MCP.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP protocol version this server negotiates by default.
pub const MCP_VERSION: &str = "2025-03-26";

/// JSON-RPC version
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// JSON-RPC REQUEST/RESPONSE
// ============================================================================

/// JSON-RPC Request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id, result: Some(result), error: None }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), id, result: None, error: Some(error) }
    }
}

// ============================================================================
// JSON-RPC ERROR
// ============================================================================

/// JSON-RPC error codes. `-32700`/`-32600` are the standard parse/invalid-
/// request codes the stdio transport uses before a request even reaches the
/// dispatcher. `MethodNotFound`/`InvalidParams`/`Internal`/`PermissionDenied`
/// are the four codes the tool dispatcher itself produces (unknown tool,
/// invalid params/action, internal, permission denied). `NotInitialized` is
/// a fifth code for the MCP session-handshake gate, kept distinct from
/// `PermissionDenied` so `-32003` means exactly one thing: admin-gating.
#[derive(Debug, Clone, Copy)]
pub enum ErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    NotInitialized = -32001,
    Internal = -32000,
    PermissionDenied = -32003,
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code as i32
    }
}

/// JSON-RPC Error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into(), data: None }
    }

    pub fn parse_error() -> Self {
        Self::new(ErrorCode::ParseError, "Parse error")
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("Unknown tool: {name}"))
    }

    pub fn unknown_method(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("Unknown method: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn invalid_action(tool: &str, value: &str) -> Self {
        Self::new(ErrorCode::InvalidParams, format!("Invalid action for {tool}: \"{value}\""))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn not_initialized() -> Self {
        Self::new(ErrorCode::NotInitialized, "Server not yet initialized")
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// Map an engine-layer error onto a dispatcher-level JSON-RPC error. Only
/// `permission_denied` and `invalid_argument` are elevated this way; every
/// other category is reported inside a successful tool-call result instead
/// (see `server::error_content`).
impl From<&palace_core::EngineError> for JsonRpcError {
    fn from(err: &palace_core::EngineError) -> Self {
        match err {
            palace_core::EngineError::PermissionDenied(msg) => JsonRpcError::permission_denied(msg.clone()),
            palace_core::EngineError::InvalidArgument(msg) => JsonRpcError::invalid_params(msg.clone()),
            other => JsonRpcError::internal_error(other.to_string()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
