//! Storage module (component A): migrations plus the `Storage` type that
//! every other component is built against.

mod migrations;
mod sqlite;

pub use migrations::{Migration, MIGRATIONS};
pub use sqlite::{CallEdge, Chunk, ImportEdge, IndexSummary, Storage, Symbol};
