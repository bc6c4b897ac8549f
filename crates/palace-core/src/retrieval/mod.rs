//! Hybrid code/knowledge retrieval (component E).

mod hybrid;
mod lexical;
mod query;
mod semantic;

pub use hybrid::{fuse, FusedHit};
pub use lexical::{attribute_rooms, group_by_room, lexical_search, lexical_search_records, AttributedHit, LexicalHit, RecordHit};
pub use query::{build_fts_query, is_exact_phrase};
pub use semantic::{find_similar, semantic_search, SemanticHit};
