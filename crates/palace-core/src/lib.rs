//! # Palace Core
//!
//! Workspace-local code and knowledge retrieval engine for AI coding agents.
//!
//! Palace Core indexes a codebase into chunks, symbols, and call/import
//! edges (`storage`); stores durable knowledge records with an authority
//! lifecycle and a scope chain from file up through room and palace
//! (`knowledge`); fuses lexical (BM25/FTS5) and semantic (embedding)
//! search (`retrieval`); answers call-graph and dependency questions
//! (`graph`); plans deterministic onboarding routes for a stated intent
//! (`route`); and coordinates concurrent agent sessions against the same
//! workspace, detecting file-edit conflicts (`session`).
//!
//! Rooms (`rooms`) are named conceptual regions of a workspace loaded
//! from JSONC manifests; most higher-level queries resolve a path to its
//! owning room before walking the scope chain.
//!
//! ```rust,ignore
//! use palace_core::{Config, Storage, RoomCache};
//!
//! let config = Config::from_env("/workspace".into(), false);
//! let storage = Storage::new(config.db_path())?;
//! let rooms = RoomCache::load(&config.rooms_dir());
//! ```

pub mod config;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod knowledge;
pub mod llm;
pub mod retrieval;
pub mod rooms;
pub mod route;
pub mod session;
pub mod storage;

pub use config::Config;
pub use error::{EngineError, Result};
pub use knowledge::{
    Authority, DecayEntry, Link, LinkDirection, Message, Outcome, Record, RecordFilter, RecordInput, RecordKind,
    RecordPatch, Scope,
};
pub use rooms::{Room, RoomCache};
pub use storage::{CallEdge, Chunk, ImportEdge, Storage, Symbol};
