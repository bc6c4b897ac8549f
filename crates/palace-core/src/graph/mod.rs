//! Read-only graph queries over call/import edges and symbols (component F).

use std::collections::{HashSet, VecDeque};

use crate::error::Result;
use crate::storage::{CallEdge, Storage};

const MAX_DEPENDENCY_DEPTH: usize = 10;

/// A call-graph neighborhood: incoming and outgoing call edges for a file.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallGraph {
    pub incoming: Vec<CallEdge>,
    pub outgoing: Vec<CallEdge>,
}

/// The result of a bidirectional impact query.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Impact {
    pub dependents: Vec<String>,
    pub dependencies: Vec<String>,
}

impl Storage {
    /// Calls into `symbol`. Ambiguous (multiple files define `symbol`) falls
    /// back to every match.
    pub fn incoming_calls(&self, symbol: &str) -> Result<Vec<CallEdge>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT caller_symbol, caller_file, callee_symbol, callee_file, line
             FROM call_edges WHERE callee_symbol = ?1",
        )?;
        let edges = stmt
            .query_map([symbol], row_to_call_edge)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(edges)
    }

    /// Calls made by `symbol`, optionally scoped to `file`.
    pub fn outgoing_calls(&self, symbol: &str, file: Option<&str>) -> Result<Vec<CallEdge>> {
        let conn = self.reader();
        let edges = if let Some(file) = file {
            let mut stmt = conn.prepare(
                "SELECT caller_symbol, caller_file, callee_symbol, callee_file, line
                 FROM call_edges WHERE caller_symbol = ?1 AND caller_file = ?2",
            )?;
            stmt.query_map(rusqlite::params![symbol, file], row_to_call_edge)?
                .collect::<rusqlite::Result<_>>()?
        } else {
            let mut stmt = conn.prepare(
                "SELECT caller_symbol, caller_file, callee_symbol, callee_file, line
                 FROM call_edges WHERE caller_symbol = ?1",
            )?;
            stmt.query_map([symbol], row_to_call_edge)?.collect::<rusqlite::Result<_>>()?
        };
        Ok(edges)
    }

    pub fn call_graph(&self, file: &str) -> Result<CallGraph> {
        let conn = self.reader();
        let mut incoming_stmt = conn.prepare(
            "SELECT caller_symbol, caller_file, callee_symbol, callee_file, line
             FROM call_edges WHERE callee_file = ?1",
        )?;
        let incoming = incoming_stmt
            .query_map([file], row_to_call_edge)?
            .collect::<rusqlite::Result<_>>()?;
        drop(incoming_stmt);

        let mut outgoing_stmt = conn.prepare(
            "SELECT caller_symbol, caller_file, callee_symbol, callee_file, line
             FROM call_edges WHERE caller_file = ?1",
        )?;
        let outgoing = outgoing_stmt
            .query_map([file], row_to_call_edge)?
            .collect::<rusqlite::Result<_>>()?;

        Ok(CallGraph { incoming, outgoing })
    }

    /// BFS over `import_edges` from `root_files`, cycle-safe via a
    /// visited set, capped at depth 10.
    pub fn dependency_graph(&self, root_files: &[String]) -> Result<Vec<String>> {
        let conn = self.reader();
        let mut visited: HashSet<String> = root_files.iter().cloned().collect();
        let mut queue: VecDeque<(String, usize)> = root_files.iter().map(|f| (f.clone(), 0)).collect();
        let mut order = Vec::new();

        while let Some((file, depth)) = queue.pop_front() {
            order.push(file.clone());
            if depth >= MAX_DEPENDENCY_DEPTH {
                continue;
            }
            let mut stmt = conn.prepare("SELECT to_module FROM import_edges WHERE from_file = ?1")?;
            let modules: Vec<String> = stmt.query_map([&file], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
            for module in modules {
                if visited.insert(module.clone()) {
                    queue.push_back((module, depth + 1));
                }
            }
        }

        Ok(order)
    }

    /// Bidirectional depth-2 impact analysis over call and import edges.
    pub fn impact(&self, target: &str) -> Result<Impact> {
        let conn = self.reader();

        let mut dependents: HashSet<String> = HashSet::new();
        let mut frontier = vec![target.to_string()];
        for _ in 0..2 {
            let mut next = Vec::new();
            for file in &frontier {
                let mut stmt = conn.prepare("SELECT from_file FROM import_edges WHERE to_module = ?1")?;
                let callers: Vec<String> = stmt.query_map([file], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
                for caller in callers {
                    if dependents.insert(caller.clone()) {
                        next.push(caller);
                    }
                }
            }
            frontier = next;
        }

        let mut dependencies: HashSet<String> = HashSet::new();
        let mut frontier = vec![target.to_string()];
        for _ in 0..2 {
            let mut next = Vec::new();
            for file in &frontier {
                let mut stmt = conn.prepare("SELECT to_module FROM import_edges WHERE from_file = ?1")?;
                let modules: Vec<String> = stmt.query_map([file], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
                for module in modules {
                    if dependencies.insert(module.clone()) {
                        next.push(module);
                    }
                }
            }
            frontier = next;
        }

        let mut dependents: Vec<String> = dependents.into_iter().collect();
        let mut dependencies: Vec<String> = dependencies.into_iter().collect();
        dependents.sort();
        dependencies.sort();

        Ok(Impact { dependents, dependencies })
    }
}

fn row_to_call_edge(row: &rusqlite::Row) -> rusqlite::Result<CallEdge> {
    Ok(CallEdge {
        caller_symbol: row.get(0)?,
        caller_file: row.get(1)?,
        callee_symbol: row.get(2)?,
        callee_file: row.get(3)?,
        line: row.get(4)?,
    })
}
