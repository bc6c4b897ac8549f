//! Shared collaborators injected into every tool handler.
//!
//! Mirrors the Design Notes' resolution of the teacher's cyclic
//! Butler/Memory/Server references: the dispatcher constructs one value
//! holding every collaborator and passes it down by reference, instead of
//! reaching for a global singleton.

use std::sync::Arc;

use palace_core::embeddings::{Embedder, Pipeline};
use palace_core::llm::LlmClient;
use palace_core::{Authority, Config, EngineError, Record, RecordFilter, RoomCache, Scope, Storage};

pub struct Context {
    pub storage: Arc<Storage>,
    pub corridor: Arc<Storage>,
    pub rooms: Arc<RoomCache>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub pipeline: Option<Arc<Pipeline>>,
    pub config: Config,
}

impl Context {
    pub fn admin(&self) -> bool {
        self.config.admin
    }

    pub fn require_admin(&self, action: &str) -> Result<(), ToolError> {
        if self.admin() {
            Ok(())
        } else {
            Err(ToolError::Engine(EngineError::PermissionDenied(format!(
                "{action} requires admin mode"
            ))))
        }
    }

    pub fn require_embedder(&self) -> Result<Arc<dyn Embedder>, ToolError> {
        self.embedder.clone().ok_or_else(|| {
            ToolError::Engine(EngineError::Unavailable("no embedder configured".to_string()))
        })
    }

    pub fn require_llm(&self) -> Result<Arc<dyn LlmClient>, ToolError> {
        self.llm
            .clone()
            .ok_or_else(|| ToolError::Engine(EngineError::Unavailable("no llm client configured".to_string())))
    }

    /// The outermost link of the `file -> room -> palace -> corridor`
    /// scope chain: approved palace-scope records from the cross-workspace
    /// personal store, which lives in its own `Storage` instance and so
    /// can't be folded into a single `list_records` call against
    /// `self.storage`.
    pub fn corridor_records(&self) -> Result<Vec<Record>, ToolError> {
        Ok(self.corridor.list_records(
            None,
            RecordFilter { authority: Some(Authority::Approved), scope: Some(Scope::Palace), ..Default::default() },
        )?)
    }
}

/// The handler-seam error the dispatcher maps onto a JSON-RPC response.
/// `Engine` carries a typed taxonomy error (see `EngineError`); only its
/// `PermissionDenied`/`InvalidArgument` variants are elevated to a
/// top-level JSON-RPC error, everything else becomes `isError: true`
/// content. `Message` is for failures outside the taxonomy — argument
/// deserialization, serialization — and always becomes content.
#[derive(Debug)]
pub enum ToolError {
    Engine(EngineError),
    Message(String),
}

impl From<EngineError> for ToolError {
    fn from(err: EngineError) -> Self {
        ToolError::Engine(err)
    }
}

impl From<String> for ToolError {
    fn from(msg: String) -> Self {
        ToolError::Message(msg)
    }
}

impl From<&str> for ToolError {
    fn from(msg: &str) -> Self {
        ToolError::Message(msg.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::Message(err.to_string())
    }
}

/// Parse a tool call's `arguments` value into its typed `Args` struct,
/// treating an absent value as an empty object so all-optional arg
/// structs still parse.
pub fn parse_args<T: serde::de::DeserializeOwned>(arguments: Option<serde_json::Value>) -> Result<T, ToolError> {
    let value = arguments.unwrap_or_else(|| serde_json::json!({}));
    serde_json::from_value(value).map_err(ToolError::from)
}

/// Build the standard `Invalid action for <tool>: "<value>"` error as an
/// `invalid_argument`, which the dispatcher elevates to a top-level
/// JSON-RPC `-32602`.
pub fn invalid_action(tool: &str, value: &str) -> ToolError {
    ToolError::Engine(EngineError::InvalidArgument(format!("Invalid action for {tool}: \"{value}\"")))
}

pub fn missing_arg(tool: &str, arg: &str) -> ToolError {
    ToolError::Engine(EngineError::InvalidArgument(format!("{tool} requires \"{arg}\"")))
}
