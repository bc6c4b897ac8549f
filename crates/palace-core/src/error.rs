//! Engine-wide error taxonomy.
//!
//! Every fallible operation in the storage, retrieval, knowledge, graph,
//! route, and session layers returns `Result<T, EngineError>`. The MCP
//! dispatcher is the single place that maps a variant onto a JSON-RPC
//! error code.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// The error taxonomy shared by every engine component.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// The error-taxonomy category name from the spec's error handling design.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::PermissionDenied(_) => "permission_denied",
            EngineError::Conflict(_) => "conflict",
            EngineError::Unavailable(_) => "unavailable",
            EngineError::Timeout(_) => "timeout",
            EngineError::Internal(_) | EngineError::Database(_) | EngineError::Io(_) => "internal",
        }
    }
}
