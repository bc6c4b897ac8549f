//! SQLite-backed storage layer (component A) plus the chunk/symbol index (component B).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::{EngineError, Result};

/// A single indexed code chunk.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub path: String,
    pub chunk_index: i64,
    pub start_line: i64,
    pub end_line: i64,
    pub content: String,
    pub language: Option<String>,
}

/// A symbol extracted from a file by the external parser.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub name: String,
    pub kind: String,
    pub file_path: String,
    pub line: i64,
    pub signature: Option<String>,
    pub doc: Option<String>,
    pub exported: bool,
}

/// A directed import relationship between files/modules.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportEdge {
    pub from_file: String,
    pub to_module: String,
}

/// A directed call-site relationship between symbols.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEdge {
    pub caller_symbol: String,
    pub caller_file: String,
    pub callee_symbol: String,
    pub callee_file: Option<String>,
    pub line: i64,
}

/// Row counts and schema version reported by `Storage::index_summary`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub schema_version: u32,
    pub files_indexed: i64,
    pub chunks: i64,
    pub symbols: i64,
    pub records: i64,
    pub embeddings: i64,
}

/// The embedded relational store. Readers and writers use separate
/// connections to the same file so the type is `Send + Sync` without
/// wrapping the whole store behind one lock: writes are serialized
/// amongst themselves, reads proceed concurrently with each other.
pub struct Storage {
    pub(crate) writer: Mutex<Connection>,
    pub(crate) reader: Mutex<Connection>,
    db_path: PathBuf,
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    Ok(())
}

impl Storage {
    /// Open (creating if absent) the database at `db_path`, applying any pending migrations.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer_conn = Connection::open(&db_path)?;
        configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&db_path)?;
        configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            db_path,
        })
    }

    /// Open a database inside `dir`, used by tests and by the corridor
    /// store when no persistent directory is configured.
    pub fn open_temp(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(dir.as_ref().join("index.db"))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Row counts across the chunk/symbol/record tables plus the applied
    /// schema version, for the `index` tool's status report.
    pub fn index_summary(&self) -> Result<IndexSummary> {
        let conn = self.reader();
        let count = |table: &str| -> rusqlite::Result<i64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        };
        Ok(IndexSummary {
            schema_version: super::migrations::get_current_version(&conn)?,
            files_indexed: conn.query_row("SELECT COUNT(DISTINCT path) FROM chunks", [], |row| row.get(0))?,
            chunks: count("chunks")?,
            symbols: count("symbols")?,
            records: count("records")?,
            embeddings: count("embeddings")?,
        })
    }

    pub(crate) fn writer(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.writer.lock().expect("storage writer mutex poisoned")
    }

    pub(crate) fn reader(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.reader.lock().expect("storage reader mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Component B: chunk / symbol index
    // ------------------------------------------------------------------

    /// Replace every chunk/symbol/edge previously indexed for `path` with
    /// the given set, in a single write transaction (idempotent per file).
    pub fn reindex_file(
        &self,
        path: &str,
        chunks: &[Chunk],
        symbols: &[Symbol],
        import_edges: &[ImportEdge],
        call_edges: &[CallEdge],
    ) -> Result<()> {
        let mut conn = self.writer();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM chunks WHERE path = ?1", [path])?;
        tx.execute("DELETE FROM symbols WHERE file_path = ?1", [path])?;
        tx.execute("DELETE FROM import_edges WHERE from_file = ?1", [path])?;
        tx.execute("DELETE FROM call_edges WHERE caller_file = ?1", [path])?;

        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (path, chunk_index, start_line, end_line, content, language)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    chunk.path,
                    chunk.chunk_index,
                    chunk.start_line,
                    chunk.end_line,
                    chunk.content,
                    chunk.language,
                ],
            )?;
        }

        for symbol in symbols {
            tx.execute(
                "INSERT OR REPLACE INTO symbols (name, kind, file_path, line, signature, doc, exported)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    symbol.name,
                    symbol.kind,
                    symbol.file_path,
                    symbol.line,
                    symbol.signature,
                    symbol.doc,
                    symbol.exported,
                ],
            )?;
        }

        for edge in import_edges {
            tx.execute(
                "INSERT OR IGNORE INTO import_edges (from_file, to_module) VALUES (?1, ?2)",
                rusqlite::params![edge.from_file, edge.to_module],
            )?;
        }

        for edge in call_edges {
            tx.execute(
                "INSERT OR IGNORE INTO call_edges (caller_symbol, caller_file, callee_symbol, callee_file, line)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    edge.caller_symbol,
                    edge.caller_file,
                    edge.callee_symbol,
                    edge.callee_file,
                    edge.line,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Concatenate a file's chunks, ordered by `chunk_index`, with `\n` separators.
    pub fn read_file(&self, path: &str) -> Result<String> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT content FROM chunks WHERE path = ?1 ORDER BY chunk_index ASC",
        )?;
        let rows: Vec<String> = stmt
            .query_map([path], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        if rows.is_empty() {
            return Err(EngineError::NotFound(format!("file not indexed: {path}")));
        }

        Ok(rows.join("\n"))
    }

    pub fn chunks_for_path(&self, path: &str) -> Result<Vec<Chunk>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT path, chunk_index, start_line, end_line, content, language
             FROM chunks WHERE path = ?1 ORDER BY chunk_index ASC",
        )?;
        let chunks = stmt
            .query_map([path], |row| {
                Ok(Chunk {
                    path: row.get(0)?,
                    chunk_index: row.get(1)?,
                    start_line: row.get(2)?,
                    end_line: row.get(3)?,
                    content: row.get(4)?,
                    language: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(chunks)
    }

    pub fn symbols_by_name(&self, name: &str) -> Result<Vec<Symbol>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT name, kind, file_path, line, signature, doc, exported
             FROM symbols WHERE name = ?1",
        )?;
        let symbols = stmt
            .query_map([name], |row| {
                Ok(Symbol {
                    name: row.get(0)?,
                    kind: row.get(1)?,
                    file_path: row.get(2)?,
                    line: row.get(3)?,
                    signature: row.get(4)?,
                    doc: row.get(5)?,
                    exported: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(symbols)
    }
}
