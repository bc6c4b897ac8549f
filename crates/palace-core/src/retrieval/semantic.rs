//! Semantic search over stored embeddings (component E).

use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::{EngineError, Result};
use crate::storage::Storage;

/// A semantic hit: the reference string stored alongside the embedding
/// (a record id, or `path#chunk_index` for a chunk) plus its similarity.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticHit {
    pub reference: String,
    pub similarity: f32,
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Embed `query` and rank every stored embedding under `model_id` by
/// cosine similarity, optionally restricted to references with
/// `ref_prefix` (e.g. a record id prefix like `"d_"` to scope to
/// decisions, or empty for no restriction).
pub async fn semantic_search(
    storage: &Storage,
    embedder: &dyn Embedder,
    model_id: &str,
    query: &str,
    limit: usize,
    min_similarity: f32,
    ref_prefix: Option<&str>,
    exclude: Option<&str>,
) -> Result<Vec<SemanticHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let query_vector = embedder
        .embed(&[query.to_string()], model_id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::Internal("embedder returned no vector".into()))?;

    let rows: Vec<(String, Vec<u8>)> = {
        let conn = storage.reader();
        let mut stmt = conn.prepare("SELECT ref, vector FROM embeddings WHERE model_id = ?1")?;
        stmt.query_map([model_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?
    };

    let mut hits: Vec<SemanticHit> = rows
        .into_iter()
        .filter(|(reference, _)| ref_prefix.map(|p| reference.starts_with(p)).unwrap_or(true))
        .filter(|(reference, _)| exclude.map(|id| reference != id).unwrap_or(true))
        .map(|(reference, bytes)| {
            let vector = decode_vector(&bytes);
            let similarity = cosine_similarity(&query_vector, &vector);
            SemanticHit { reference, similarity }
        })
        .filter(|hit| hit.similarity >= min_similarity)
        .collect();

    hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    Ok(hits)
}

/// `findSimilar(id, limit, minSim)`: look up `id`'s own embedding and
/// rank every other embedding under the same model by similarity to it.
pub async fn find_similar(storage: &Storage, model_id: &str, id: &str, limit: usize, min_similarity: f32) -> Result<Vec<SemanticHit>> {
    let seed_bytes: Vec<u8> = {
        let conn = storage.reader();
        conn.query_row(
            "SELECT vector FROM embeddings WHERE ref = ?1 AND model_id = ?2",
            rusqlite::params![id, model_id],
            |row| row.get(0),
        )
        .map_err(|_| EngineError::NotFound(format!("no embedding stored for {id}")))?
    };
    let seed_vector = decode_vector(&seed_bytes);

    let rows: Vec<(String, Vec<u8>)> = {
        let conn = storage.reader();
        let mut stmt = conn.prepare("SELECT ref, vector FROM embeddings WHERE model_id = ?1 AND ref != ?2")?;
        stmt.query_map(rusqlite::params![model_id, id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?
    };

    let mut hits: Vec<SemanticHit> = rows
        .into_iter()
        .map(|(reference, bytes)| {
            let vector = decode_vector(&bytes);
            let similarity = cosine_similarity(&seed_vector, &vector);
            SemanticHit { reference, similarity }
        })
        .filter(|hit| hit.similarity >= min_similarity)
        .collect();

    hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    Ok(hits)
}
