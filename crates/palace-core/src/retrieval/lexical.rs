//! Lexical search and score fusion over the chunk index (component E).

use crate::error::Result;
use crate::rooms::RoomCache;
use crate::storage::Storage;

use super::query::build_fts_query;

const BOOSTABLE_EXTENSIONS: &[&str] = &[
    "go", "ts", "tsx", "js", "jsx", "py", "rs", "java", "c", "cpp", "rb", "swift", "kt",
];

/// A single lexical hit before room attribution.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub path: String,
    pub chunk_index: i64,
    pub start_line: i64,
    pub end_line: i64,
    pub snippet: String,
    pub score: f64,
}

/// A lexical hit against the knowledge record index, keyed by record id
/// so it shares a reference namespace with semantic hits (both resolve
/// to `records.id`).
#[derive(Debug, Clone)]
pub struct RecordHit {
    pub id: String,
    pub score: f64,
}

/// A lexical hit attributed to a room.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributedHit {
    pub path: String,
    pub chunk_index: i64,
    pub start_line: i64,
    pub end_line: i64,
    pub snippet: String,
    pub score: f64,
    pub room: String,
    pub is_entry: bool,
}

/// Search the chunk index for `query`, returning up to `limit` hits
/// sorted by fused score descending. An empty/whitespace-only query or a
/// missing FTS index yields an empty result, not an error.
pub fn lexical_search(storage: &Storage, rooms: &RoomCache, query: &str, limit: usize, fuzzy: bool) -> Result<Vec<LexicalHit>> {
    let Some(fts_query) = build_fts_query(query, fuzzy) else {
        return Ok(Vec::new());
    };

    let over_fetch = (limit * 3).max(1);
    let conn = storage.reader();
    let mut stmt = conn.prepare(
        "SELECT c.path, c.chunk_index, c.start_line, c.end_line, c.content, bm25(chunks_fts) AS rank
         FROM chunks_fts
         JOIN chunks c ON c.rowid = chunks_fts.rowid
         WHERE chunks_fts MATCH ?1
         ORDER BY rank ASC
         LIMIT ?2",
    )?;

    let raw_hits: Vec<(String, i64, i64, i64, String, f64)> = stmt
        .query_map(rusqlite::params![fts_query, over_fetch as i64], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
        })?
        .collect::<rusqlite::Result<_>>()?;
    drop(stmt);
    drop(conn);

    let lowered_query = query.to_lowercase();
    let query_words: Vec<String> = lowered_query
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(|w| w.to_string())
        .collect();

    let mut hits: Vec<LexicalHit> = raw_hits
        .into_iter()
        .map(|(path, chunk_index, start_line, end_line, content, base_score)| {
            let score = fuse_score(&path, base_score, rooms, &lowered_query, &query_words);
            LexicalHit { path, chunk_index, start_line, end_line, snippet: snippet_of(&content), score }
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    Ok(hits)
}

/// Search `records_fts` for `query`, returning up to `limit` record ids
/// ranked by BM25. This is the records-side counterpart to
/// `lexical_search`'s chunk-side query: semantic search over knowledge
/// resolves embeddings keyed by `records.id`, so hybrid fusion needs a
/// lexical source keyed the same way rather than only chunk paths.
pub fn lexical_search_records(storage: &Storage, query: &str, limit: usize, fuzzy: bool) -> Result<Vec<RecordHit>> {
    let Some(fts_query) = build_fts_query(query, fuzzy) else {
        return Ok(Vec::new());
    };

    let conn = storage.reader();
    let mut stmt = conn.prepare(
        "SELECT r.id, bm25(records_fts) AS rank
         FROM records_fts
         JOIN records r ON r.rowid = records_fts.rowid
         WHERE records_fts MATCH ?1
         ORDER BY rank ASC
         LIMIT ?2",
    )?;

    let hits: Vec<RecordHit> = stmt
        .query_map(rusqlite::params![fts_query, limit as i64], |row| {
            let id: String = row.get(0)?;
            let rank: f64 = row.get(1)?;
            Ok(RecordHit { id, score: -rank })
        })?
        .collect::<rusqlite::Result<_>>()?;
    Ok(hits)
}

fn snippet_of(content: &str) -> String {
    content.lines().take(3).collect::<Vec<_>>().join("\n")
}

fn fuse_score(path: &str, base_score: f64, rooms: &RoomCache, lowered_query: &str, query_words: &[String]) -> f64 {
    let mut score = -base_score;

    if rooms.is_entry_point(path).is_some() {
        score *= 3.0;
    }

    let lowered_path = path.to_lowercase();
    if lowered_path.contains(lowered_query) && !lowered_query.is_empty() {
        score *= 2.5;
    } else if query_words.iter().any(|w| lowered_path.contains(w.as_str())) {
        score *= 1.5;
    }

    if let Some(ext) = std::path::Path::new(path).extension().and_then(|e| e.to_str()) {
        if BOOSTABLE_EXTENSIONS.contains(&ext) {
            score *= 1.2;
        }
    }

    score
}

/// Attach room attribution to each hit, per the Room attribution rule.
pub fn attribute_rooms(hits: Vec<LexicalHit>, rooms: &RoomCache, default_room: &str) -> Vec<AttributedHit> {
    hits.into_iter()
        .map(|hit| {
            if let Some(room) = rooms.is_entry_point(&hit.path) {
                return AttributedHit {
                    path: hit.path,
                    chunk_index: hit.chunk_index,
                    start_line: hit.start_line,
                    end_line: hit.end_line,
                    snippet: hit.snippet,
                    score: hit.score,
                    room: room.name,
                    is_entry: true,
                };
            }
            let room_name = rooms
                .room_for_path(&hit.path)
                .map(|r| r.name)
                .unwrap_or_else(|| {
                    if default_room.is_empty() { "_ungrouped".to_string() } else { default_room.to_string() }
                });
            AttributedHit {
                path: hit.path,
                chunk_index: hit.chunk_index,
                start_line: hit.start_line,
                end_line: hit.end_line,
                snippet: hit.snippet,
                score: hit.score,
                room: room_name,
                is_entry: false,
            }
        })
        .collect()
}

/// Partition attributed hits by room, preserving first-seen room order.
pub fn group_by_room(hits: Vec<AttributedHit>) -> Vec<(String, Vec<AttributedHit>)> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<AttributedHit>> = std::collections::HashMap::new();

    for hit in hits {
        if !groups.contains_key(&hit.room) {
            order.push(hit.room.clone());
        }
        groups.entry(hit.room.clone()).or_default().push(hit);
    }

    order.into_iter().map(|name| (name.clone(), groups.remove(&name).unwrap_or_default())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Chunk;
    use crate::RecordInput;

    fn seeded_storage() -> (Storage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open_temp(dir.path()).unwrap();
        storage
            .reindex_file(
                "src/auth/login.rs",
                &[Chunk {
                    path: "src/auth/login.rs".into(),
                    chunk_index: 0,
                    start_line: 1,
                    end_line: 5,
                    content: "fn authenticate_user() { check_credentials() }".into(),
                    language: Some("rust".into()),
                }],
                &[],
                &[],
                &[],
            )
            .unwrap();
        storage
            .reindex_file(
                "src/misc/util.rs",
                &[Chunk {
                    path: "src/misc/util.rs".into(),
                    chunk_index: 0,
                    start_line: 1,
                    end_line: 5,
                    content: "fn authenticate_user_helper() {}".into(),
                    language: Some("rust".into()),
                }],
                &[],
                &[],
                &[],
            )
            .unwrap();
        (storage, dir)
    }

    #[test]
    fn empty_query_returns_empty_not_error() {
        let (storage, _dir) = seeded_storage();
        let rooms = RoomCache::new();
        let hits = lexical_search(&storage, &rooms, "   ", 10, false).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn path_substring_boost_ranks_matching_path_higher() {
        let (storage, _dir) = seeded_storage();
        let rooms = RoomCache::new();
        let hits = lexical_search(&storage, &rooms, "authenticate", 10, false).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].path, "src/auth/login.rs");
    }

    #[test]
    fn record_search_ranks_by_bm25_and_is_keyed_by_record_id() {
        let (storage, _dir) = seeded_storage();
        let close = storage
            .add_record(RecordInput { content: "retry with exponential backoff".into(), direct: Some(true), ..Default::default() }, true)
            .unwrap();
        storage
            .add_record(RecordInput { content: "rewrite the changelog generator".into(), direct: Some(true), ..Default::default() }, true)
            .unwrap();

        let hits = lexical_search_records(&storage, "backoff", 10, false).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, close.id);
    }

    #[test]
    fn grouping_preserves_first_seen_room_order() {
        let hits = vec![
            AttributedHit {
                path: "b".into(),
                chunk_index: 0,
                start_line: 1,
                end_line: 1,
                snippet: String::new(),
                score: 1.0,
                room: "zebra".into(),
                is_entry: false,
            },
            AttributedHit {
                path: "a".into(),
                chunk_index: 0,
                start_line: 1,
                end_line: 1,
                snippet: String::new(),
                score: 1.0,
                room: "alpha".into(),
                is_entry: false,
            },
            AttributedHit {
                path: "c".into(),
                chunk_index: 0,
                start_line: 1,
                end_line: 1,
                snippet: String::new(),
                score: 1.0,
                room: "zebra".into(),
                is_entry: false,
            },
        ];
        let groups = group_by_room(hits);
        let names: Vec<&str> = groups.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["zebra", "alpha"]);
    }
}
