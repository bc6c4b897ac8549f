//! Hybrid lexical/semantic fusion (component E).
//!
//! This is the one point in the retrieval engine with a fixed, required
//! formula rather than a tunable heuristic: min-max normalize each
//! source over the union of returned items, then rank by
//! `0.5*lexNorm + 0.5*semNorm`. Do not substitute reciprocal-rank
//! fusion or any other blend here.

use std::collections::HashMap;

/// A fused hit keyed by a caller-chosen reference string (a chunk path
/// or a record id).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedHit {
    pub reference: String,
    pub score: f64,
    pub lexical_score: Option<f64>,
    pub semantic_score: Option<f32>,
}

fn min_max_normalize(values: &HashMap<String, f64>) -> HashMap<String, f64> {
    if values.is_empty() {
        return HashMap::new();
    }
    let min = values.values().cloned().fold(f64::INFINITY, f64::min);
    let max = values.values().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return values.keys().map(|k| (k.clone(), 1.0)).collect();
    }
    values.iter().map(|(k, v)| (k.clone(), (v - min) / (max - min))).collect()
}

/// Fuse lexical hits `(reference, score)` with semantic hits
/// `(reference, similarity)`. If `semantic` is empty, degrades to
/// lexical-only (min-max normalized, semantic component absent) per the
/// documented unavailability contract.
pub fn fuse(lexical: &[(String, f64)], semantic: &[(String, f32)]) -> Vec<FusedHit> {
    let lexical_map: HashMap<String, f64> = lexical.iter().cloned().collect();
    let semantic_map: HashMap<String, f64> = semantic.iter().map(|(r, s)| (r.clone(), *s as f64)).collect();

    if semantic_map.is_empty() {
        let normalized = min_max_normalize(&lexical_map);
        let mut hits: Vec<FusedHit> = normalized
            .into_iter()
            .map(|(reference, score)| FusedHit {
                lexical_score: lexical_map.get(&reference).copied(),
                semantic_score: None,
                reference,
                score,
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        return hits;
    }

    let lex_norm = min_max_normalize(&lexical_map);
    let sem_norm = min_max_normalize(&semantic_map);

    let mut references: Vec<String> = lexical_map.keys().chain(semantic_map.keys()).cloned().collect();
    references.sort();
    references.dedup();

    let mut hits: Vec<FusedHit> = references
        .into_iter()
        .map(|reference| {
            let lex = lex_norm.get(&reference).copied().unwrap_or(0.0);
            let sem = sem_norm.get(&reference).copied().unwrap_or(0.0);
            FusedHit {
                score: 0.5 * lex + 0.5 * sem,
                lexical_score: lexical_map.get(&reference).copied(),
                semantic_score: semantic_map.get(&reference).map(|v| *v as f32),
                reference,
            }
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_of_references_is_preserved() {
        let lexical = vec![("a".to_string(), 10.0), ("b".to_string(), 2.0)];
        let semantic = vec![("b".to_string(), 0.9), ("c".to_string(), 0.1)];
        let fused = fuse(&lexical, &semantic);
        let refs: Vec<&str> = fused.iter().map(|h| h.reference.as_str()).collect();
        assert!(refs.contains(&"a"));
        assert!(refs.contains(&"b"));
        assert!(refs.contains(&"c"));
    }

    #[test]
    fn item_in_both_sources_with_top_scores_ranks_first() {
        let lexical = vec![("a".to_string(), 10.0), ("b".to_string(), 1.0)];
        let semantic = vec![("a".to_string(), 0.9), ("c".to_string(), 0.1)];
        let fused = fuse(&lexical, &semantic);
        assert_eq!(fused[0].reference, "a");
    }

    #[test]
    fn degrades_to_lexical_only_when_semantic_empty() {
        let lexical = vec![("a".to_string(), 10.0), ("b".to_string(), 2.0)];
        let fused = fuse(&lexical, &[]);
        assert_eq!(fused.len(), 2);
        assert!(fused.iter().all(|h| h.semantic_score.is_none()));
        assert_eq!(fused[0].reference, "a");
    }

    #[test]
    fn uniform_scores_normalize_to_one_not_nan() {
        let lexical = vec![("a".to_string(), 5.0), ("b".to_string(), 5.0)];
        let fused = fuse(&lexical, &[]);
        assert!(fused.iter().all(|h| (h.score - 1.0).abs() < 1e-9));
    }
}
