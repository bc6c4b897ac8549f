//! Deterministic route planner (component G).

use crate::error::Result;
use crate::knowledge::{Authority, RecordFilter, RecordKind};
use crate::rooms::RoomCache;
use crate::storage::Storage;

/// The rule set version. Bump whenever a derivation rule changes so
/// callers can detect a behavior change across upgrades.
pub const RULE_VERSION: u32 = 1;

/// The kind of a route node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Room,
    Decision,
    Learning,
    File,
}

/// A single node of a planned route.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteNode {
    pub order: usize,
    pub kind: NodeKind,
    pub id: String,
    pub reason: String,
    pub fetch_ref: String,
    #[serde(skip)]
    score: f64,
}

/// Route planner configuration.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub max_nodes: usize,
    pub min_learning_confidence: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self { max_nodes: 10, min_learning_confidence: 0.7 }
    }
}

/// Metadata accompanying a planned route.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    pub rule_version: u32,
    pub node_count: usize,
}

/// A full route: ordered nodes plus metadata.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Route {
    pub nodes: Vec<RouteNode>,
    pub meta: RouteMeta,
}

fn tokenize(intent: &str) -> Vec<String> {
    intent
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

/// Plan a route for `intent` within the given scope. `storage` supplies
/// decision/learning candidates when available; pass `None` to skip
/// memory-backed rules (2) and (3) entirely.
pub fn plan_route(
    rooms: &RoomCache,
    storage: Option<&Storage>,
    intent: &str,
    scope: &str,
    scope_path: Option<&str>,
    config: &RouteConfig,
) -> Result<Route> {
    let tokens = tokenize(intent);
    let mut candidates: Vec<RouteNode> = Vec::new();

    // Rule 1: room match.
    for room in rooms.all() {
        let lowered_name = room.name.to_lowercase();
        let lowered_summary = room.summary.to_lowercase();
        let mut score = 0.0;
        for token in &tokens {
            if lowered_name.contains(token.as_str()) {
                score += 1.0;
            }
            if lowered_summary.contains(token.as_str()) {
                score += 0.5;
            }
        }
        if score <= 0.0 {
            continue;
        }
        candidates.push(RouteNode {
            order: 0,
            kind: NodeKind::Room,
            id: room.name.clone(),
            reason: format!("intent mentions room \"{}\"", room.name),
            fetch_ref: "explore_rooms".to_string(),
            score,
        });
        for entry in &room.entry_points {
            candidates.push(RouteNode {
                order: 0,
                kind: NodeKind::File,
                id: entry.clone(),
                reason: format!("entry point of room \"{}\"", room.name),
                fetch_ref: format!("explore_file --file {entry}"),
                score: 0.8 * score,
            });
        }
    }

    if let Some(storage) = storage {
        // Rule 2: decision match.
        let decisions = storage.list_records(
            Some(RecordKind::Decision),
            RecordFilter {
                authority: Some(Authority::Approved),
                scope_path: scope_path.map(|s| s.to_string()),
                limit: Some(20),
                ..Default::default()
            },
        )?;
        for decision in decisions {
            let lowered_content = decision.content.to_lowercase();
            let lowered_rationale = decision.rationale.as_deref().unwrap_or("").to_lowercase();
            let mut score = 0.0;
            for token in &tokens {
                if lowered_content.contains(token.as_str()) {
                    score += 0.8;
                }
                if lowered_rationale.contains(token.as_str()) {
                    score += 0.3;
                }
            }
            if score > 0.0 {
                candidates.push(RouteNode {
                    order: 0,
                    kind: NodeKind::Decision,
                    id: decision.id.clone(),
                    reason: "matches intent tokens".to_string(),
                    fetch_ref: format!("recall_decisions --id {}", decision.id),
                    score,
                });
            }
        }

        // Rule 3: learning match.
        let learnings = storage.list_records(
            Some(RecordKind::Learning),
            RecordFilter {
                authority: Some(Authority::Approved),
                scope_path: scope_path.map(|s| s.to_string()),
                limit: Some(20),
                ..Default::default()
            },
        )?;
        for learning in learnings {
            if learning.confidence < config.min_learning_confidence {
                continue;
            }
            let lowered_content = learning.content.to_lowercase();
            let mut score = 0.0;
            for token in &tokens {
                if lowered_content.contains(token.as_str()) {
                    score += 0.6;
                }
            }
            score += 0.4 * learning.confidence;
            candidates.push(RouteNode {
                order: 0,
                kind: NodeKind::Learning,
                id: learning.id.clone(),
                reason: format!("confidence {:.0}%", learning.confidence * 100.0),
                fetch_ref: format!("recall --id {}", learning.id),
                score,
            });
        }
    }

    // Rule 4: scope file.
    if scope == "file" {
        if let Some(path) = scope_path {
            candidates.push(RouteNode {
                order: 0,
                kind: NodeKind::File,
                id: path.to_string(),
                reason: "Specified scope file".to_string(),
                fetch_ref: format!("explore_file --file {path}"),
                score: 0.5,
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (a.kind, &a.id).cmp(&(b.kind, &b.id)))
    });

    let mut seen = std::collections::HashSet::new();
    let mut nodes: Vec<RouteNode> = Vec::new();
    for mut candidate in candidates {
        let key = (candidate.kind, candidate.id.clone());
        if !seen.insert(key) {
            continue;
        }
        if nodes.len() >= config.max_nodes {
            break;
        }
        candidate.order = nodes.len() + 1;
        nodes.push(candidate);
    }

    let node_count = nodes.len();
    Ok(Route { nodes, meta: RouteMeta { rule_version: RULE_VERSION, node_count } })
}
