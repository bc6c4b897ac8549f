//! MCP server core: request dispatch over the stdio JSON-RPC transport.
//!
//! Routes the session handshake and `tools/*` requests to the tool
//! modules; no `resources/*` surface is exposed.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::context::{Context, ToolError};
use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ServerCapabilities, ServerInfo,
    ToolDescription, ToolsCapability, ToolsListResult,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools;

/// Ceiling on a single `tools/call` dispatch. The embedder/LLM HTTP
/// clients carry their own shorter timeouts (10s/30s); this is the
/// outer bound so a stuck handler can't hang the stdio loop forever.
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// MCP server implementation. Holds the shared `Context` and the
/// session-handshake gate; stateless beyond that.
pub struct McpServer {
    ctx: Context,
    initialized: bool,
}

impl McpServer {
    pub fn new(ctx: Context) -> Self {
        Self { ctx, initialized: false }
    }

    /// Handle an incoming JSON-RPC request. Returns `None` for
    /// notifications, which have no response.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, "handling request");

        if !self.initialized && request.method != "initialize" && request.method != "notifications/initialized" {
            warn!(method = %request.method, "rejecting request before initialize");
            return Some(JsonRpcResponse::error(request.id, JsonRpcError::not_initialized()));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!(%method, "unknown method");
                Err(JsonRpcError::unknown_method(method))
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    fn handle_initialize(&mut self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(e.to_string()))?,
            None => InitializeRequest::default(),
        };

        let negotiated_version = request.protocol_version.unwrap_or_else(|| MCP_VERSION.to_string());
        self.initialized = true;
        info!(protocol_version = %negotiated_version, "mcp session initialized");

        let result = InitializeResult {
            protocol_version: negotiated_version,
            server_info: ServerInfo { name: "palace".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
            capabilities: ServerCapabilities { tools: ToolsCapability { list_changed: false } },
            instructions: Some(
                "This server indexes the current workspace and a cross-workspace personal store. \
                 Use explore/search/brief to orient, store to propose or directly add knowledge, \
                 recall to manage existing records, and session to track multi-agent activity."
                    .to_string(),
            ),
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = vec![
            ToolDescription {
                name: "explore".to_string(),
                description: "Navigate the indexed workspace: search chunks, list rooms, fetch authoritative \
                               context for a path, or walk the symbol/call/dependency graph."
                    .to_string(),
                input_schema: tools::explore::schema(),
            },
            ToolDescription {
                name: "store".to_string(),
                description: "Record a piece of knowledge (idea, decision, learning, postmortem, or \
                               conversation). Kind is inferred unless given explicitly; direct=true bypasses \
                               the proposal queue and requires admin mode."
                    .to_string(),
                input_schema: tools::store::schema(),
            },
            ToolDescription {
                name: "recall".to_string(),
                description: "Fetch, link, and manage existing knowledge records across their lifecycle."
                    .to_string(),
                input_schema: tools::recall::schema(),
            },
            ToolDescription {
                name: "search".to_string(),
                description: "Semantic and hybrid (keyword + semantic fusion) retrieval over knowledge records."
                    .to_string(),
                input_schema: tools::search::schema(),
            },
            ToolDescription {
                name: "brief".to_string(),
                description: "Orientation summary for the workspace or a single file, optionally narrated \
                               by an LLM."
                    .to_string(),
                input_schema: tools::brief::schema(),
            },
            ToolDescription {
                name: "session".to_string(),
                description: "Agent session lifecycle, activity logging, and file-edit conflict detection."
                    .to_string(),
                input_schema: tools::session::schema(),
            },
            ToolDescription {
                name: "route".to_string(),
                description: "Deterministically plan a reading route from a natural-language intent."
                    .to_string(),
                input_schema: tools::route::schema(),
            },
            ToolDescription {
                name: "govern".to_string(),
                description: "Approve, reject, or list proposed knowledge records. Admin-only.".to_string(),
                input_schema: tools::govern::schema(),
            },
            ToolDescription {
                name: "decay".to_string(),
                description: "Preview or apply confidence decay, or reinforce/boost specific records."
                    .to_string(),
                input_schema: tools::decay::schema(),
            },
            ToolDescription {
                name: "postmortem".to_string(),
                description: "Create and browse incident write-ups, and promote their lessons learned into \
                               standalone learning records."
                    .to_string(),
                input_schema: tools::postmortem::schema(),
            },
            ToolDescription {
                name: "room".to_string(),
                description: "Browse and author room manifests.".to_string(),
                input_schema: tools::room::schema(),
            },
            ToolDescription {
                name: "index".to_string(),
                description: "Report on the state of the chunk/symbol index and the embedding pipeline."
                    .to_string(),
                input_schema: tools::index::schema(),
            },
        ];

        serde_json::to_value(ToolsListResult { tools }).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing tool call parameters")),
        };

        let name = request.name.clone();
        let arguments = request.arguments.clone();
        let dispatch: std::pin::Pin<Box<dyn std::future::Future<Output = Result<serde_json::Value, ToolError>> + Send>> =
            match name.as_str() {
                "explore" => Box::pin(tools::explore::execute(&self.ctx, arguments)),
                "store" => Box::pin(tools::store::execute(&self.ctx, arguments)),
                "recall" => Box::pin(tools::recall::execute(&self.ctx, arguments)),
                "search" => Box::pin(tools::search::execute(&self.ctx, arguments)),
                "brief" => Box::pin(tools::brief::execute(&self.ctx, arguments)),
                "session" => Box::pin(tools::session::execute(&self.ctx, arguments)),
                "route" => Box::pin(tools::route::execute(&self.ctx, arguments)),
                "govern" => Box::pin(tools::govern::execute(&self.ctx, arguments)),
                "decay" => Box::pin(tools::decay::execute(&self.ctx, arguments)),
                "postmortem" => Box::pin(tools::postmortem::execute(&self.ctx, arguments)),
                "room" => Box::pin(tools::room::execute(&self.ctx, arguments)),
                "index" => Box::pin(tools::index::execute(&self.ctx, arguments)),
                other => {
                    warn!(tool = %other, "unknown tool");
                    return Err(JsonRpcError::unknown_tool(other));
                }
            };

        let started = Instant::now();
        let result = match tokio::time::timeout(DISPATCH_TIMEOUT, dispatch).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %name, "tool dispatch timed out");
                Err(ToolError::Engine(palace_core::EngineError::Timeout(format!(
                    "{name} did not complete within {DISPATCH_TIMEOUT:?}"
                ))))
            }
        };
        let duration_ms = started.elapsed().as_millis();

        let action =
            request.arguments.as_ref().and_then(|a| a.get("action")).and_then(|v| v.as_str()).unwrap_or("default");
        match &result {
            Ok(_) => info!(tool = %request.name, action, duration_ms, outcome = "ok", "tool dispatched"),
            Err(ToolError::Engine(e)) => {
                info!(tool = %request.name, action, duration_ms, outcome = %e.category(), "tool dispatched")
            }
            Err(ToolError::Message(msg)) => {
                info!(tool = %request.name, action, duration_ms, outcome = "error", error = %msg, "tool dispatched")
            }
        }

        let value = match result {
            Ok(value) => CallToolResult::ok(&value),
            Err(ToolError::Engine(e @ palace_core::EngineError::PermissionDenied(_)))
            | Err(ToolError::Engine(e @ palace_core::EngineError::InvalidArgument(_))) => {
                return Err((&e).into());
            }
            Err(ToolError::Engine(e)) => CallToolResult::failed(e.category(), e.to_string()),
            Err(ToolError::Message(msg)) => CallToolResult::failed("internal", msg),
        };

        serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palace_core::rooms::RoomCache;
    use palace_core::{Config, Storage};
    use std::sync::Arc;

    fn test_server() -> McpServer {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::open_temp(dir.path()).unwrap());
        let corridor = Arc::new(Storage::open_temp(dir.path()).unwrap());
        let rooms = Arc::new(RoomCache::new());
        let config = Config::from_env(dir.path().to_path_buf(), false);
        let ctx = Context { storage, corridor, rooms, embedder: None, llm: None, pipeline: None, config };
        McpServer::new(ctx)
    }

    fn make_request(method: &str, params: Option<serde_json::Value>) -> JsonRpcRequest {
        JsonRpcRequest { jsonrpc: "2.0".to_string(), id: Some(serde_json::json!(1)), method: method.to_string(), params }
    }

    #[tokio::test]
    async fn rejects_calls_before_initialize() {
        let mut server = test_server();
        let response = server.handle_request(make_request("tools/list", None)).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32001);
    }

    #[tokio::test]
    async fn ping_succeeds_without_initialize() {
        let mut server = test_server();
        let response = server.handle_request(make_request("ping", None)).await.unwrap();
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn initialize_then_list_returns_twelve_tools() {
        let mut server = test_server();
        server.handle_request(make_request("initialize", None)).await;
        let response = server.handle_request(make_request("tools/list", None)).await.unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 12);
    }

    #[tokio::test]
    async fn unknown_tool_yields_method_not_found() {
        let mut server = test_server();
        server.handle_request(make_request("initialize", None)).await;
        let response = server
            .handle_request(make_request("tools/call", Some(serde_json::json!({"name": "bogus"}))))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn invalid_action_is_elevated_to_invalid_params() {
        let mut server = test_server();
        server.handle_request(make_request("initialize", None)).await;
        let response = server
            .handle_request(make_request(
                "tools/call",
                Some(serde_json::json!({"name": "explore", "arguments": {"action": "bogus"}})),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn admin_gated_action_without_admin_is_elevated_to_permission_denied() {
        let mut server = test_server();
        server.handle_request(make_request("initialize", None)).await;
        let response = server
            .handle_request(make_request(
                "tools/call",
                Some(serde_json::json!({"name": "govern", "arguments": {"action": "list"}})),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32003);
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let mut server = test_server();
        server.handle_request(make_request("initialize", None)).await;
        let response = server.handle_request(make_request("nonexistent", None)).await.unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }
}
