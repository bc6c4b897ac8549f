//! Database migrations for the storage layer.

/// Migration definitions, applied in order against a fresh or partially-migrated database.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "chunks, symbols, edges, records, links, embeddings, sessions, activity, metadata",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "proposal table and authority indexes",
        up: MIGRATION_V2_UP,
    },
];

/// A single database migration.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    path TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    content TEXT NOT NULL,
    language TEXT,
    PRIMARY KEY (path, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    path,
    chunk_index UNINDEXED,
    content,
    content='chunks',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, path, chunk_index, content)
    VALUES (NEW.rowid, NEW.path, NEW.chunk_index, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, path, chunk_index, content)
    VALUES ('delete', OLD.rowid, OLD.path, OLD.chunk_index, OLD.content);
END;

CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, path, chunk_index, content)
    VALUES ('delete', OLD.rowid, OLD.path, OLD.chunk_index, OLD.content);
    INSERT INTO chunks_fts(rowid, path, chunk_index, content)
    VALUES (NEW.rowid, NEW.path, NEW.chunk_index, NEW.content);
END;

CREATE TABLE IF NOT EXISTS symbols (
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    file_path TEXT NOT NULL,
    line INTEGER NOT NULL,
    signature TEXT,
    doc TEXT,
    exported INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (file_path, name, kind)
);

CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);

CREATE TABLE IF NOT EXISTS import_edges (
    from_file TEXT NOT NULL,
    to_module TEXT NOT NULL,
    PRIMARY KEY (from_file, to_module)
);

CREATE TABLE IF NOT EXISTS call_edges (
    caller_symbol TEXT NOT NULL,
    caller_file TEXT NOT NULL,
    callee_symbol TEXT NOT NULL,
    callee_file TEXT,
    line INTEGER NOT NULL,
    PRIMARY KEY (caller_symbol, caller_file, callee_symbol, line)
);

CREATE INDEX IF NOT EXISTS idx_call_edges_callee ON call_edges(callee_symbol);

CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    scope TEXT NOT NULL,
    scope_path TEXT,
    created_at TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'open',
    authority TEXT NOT NULL DEFAULT 'proposed',
    confidence REAL NOT NULL DEFAULT 0.5,
    last_access_at TEXT NOT NULL,
    -- decision fields
    rationale TEXT,
    outcome TEXT,
    outcome_note TEXT,
    -- learning fields
    obsolete_reason TEXT,
    -- postmortem fields
    title TEXT,
    what_happened TEXT,
    root_cause TEXT,
    lessons_learned TEXT,
    prevention_steps TEXT,
    severity TEXT,
    affected_files TEXT,
    related_decision TEXT,
    resolved_at TEXT,
    -- conversation fields
    summary TEXT,
    messages TEXT,
    session_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);
CREATE INDEX IF NOT EXISTS idx_records_scope ON records(scope, scope_path);
CREATE INDEX IF NOT EXISTS idx_records_authority ON records(authority);
CREATE INDEX IF NOT EXISTS idx_records_last_access ON records(last_access_at);

CREATE VIRTUAL TABLE IF NOT EXISTS records_fts USING fts5(
    id UNINDEXED,
    content,
    rationale,
    tags,
    content='records',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS records_ai AFTER INSERT ON records BEGIN
    INSERT INTO records_fts(rowid, id, content, rationale, tags)
    VALUES (NEW.rowid, NEW.id, NEW.content, NEW.rationale, NEW.tags);
END;

CREATE TRIGGER IF NOT EXISTS records_ad AFTER DELETE ON records BEGIN
    INSERT INTO records_fts(records_fts, rowid, id, content, rationale, tags)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content, OLD.rationale, OLD.tags);
END;

CREATE TRIGGER IF NOT EXISTS records_au AFTER UPDATE ON records BEGIN
    INSERT INTO records_fts(records_fts, rowid, id, content, rationale, tags)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.content, OLD.rationale, OLD.tags);
    INSERT INTO records_fts(rowid, id, content, rationale, tags)
    VALUES (NEW.rowid, NEW.id, NEW.content, NEW.rationale, NEW.tags);
END;

CREATE TABLE IF NOT EXISTS links (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    relation TEXT NOT NULL,
    UNIQUE(source_id, target_id, relation)
);

CREATE INDEX IF NOT EXISTS idx_links_source ON links(source_id);
CREATE INDEX IF NOT EXISTS idx_links_target ON links(target_id);

CREATE TABLE IF NOT EXISTS embeddings (
    ref TEXT NOT NULL,
    model_id TEXT NOT NULL,
    vector BLOB NOT NULL,
    dim INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (ref, model_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    agent_type TEXT NOT NULL,
    agent_id TEXT,
    goal TEXT,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    state TEXT NOT NULL DEFAULT 'active',
    outcome TEXT,
    summary TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_state ON sessions(state);

CREATE TABLE IF NOT EXISTS activity (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    target TEXT NOT NULL,
    outcome TEXT NOT NULL DEFAULT 'unknown',
    details TEXT,
    ts TEXT NOT NULL,
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_activity_target_ts ON activity(target, ts);
CREATE INDEX IF NOT EXISTS idx_activity_session ON activity(session_id);

CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS proposals (
    id TEXT PRIMARY KEY,
    record_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY (record_id) REFERENCES records(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_proposals_record ON proposals(record_id);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
"#;

/// Read the highest applied schema version.
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply every migration whose version exceeds the current schema version.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
