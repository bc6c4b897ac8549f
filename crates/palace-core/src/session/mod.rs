//! Session coordination and file intelligence (component H).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::storage::Storage;

/// A work session for one agent.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub agent_type: String,
    pub agent_id: Option<String>,
    pub goal: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub state: String,
    pub outcome: Option<String>,
    pub summary: Option<String>,
}

/// A single logged activity within a session.
#[derive(Debug, Clone)]
pub struct Activity {
    pub kind: String,
    pub target: String,
    pub outcome: String,
    pub details: Option<String>,
}

/// A detected conflict: another active session recently touched the
/// same path.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub session_id: String,
    pub agent_type: String,
    pub last_touched_at: DateTime<Utc>,
}

/// Derived intelligence about a file's edit history.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIntel {
    pub path: String,
    pub edit_count: i64,
    pub last_edit_ts: Option<DateTime<Utc>>,
    pub failure_rate: f64,
    pub recent_agents: Vec<String>,
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get("id")?,
        agent_type: row.get("agent_type")?,
        agent_id: row.get("agent_id")?,
        goal: row.get("goal")?,
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
        state: row.get("state")?,
        outcome: row.get("outcome")?,
        summary: row.get("summary")?,
    })
}

impl Storage {
    pub fn start_session(&self, agent_type: &str, agent_id: Option<&str>, goal: Option<&str>) -> Result<Session> {
        let id = format!("sess_{}", Uuid::new_v4().simple());
        let now = Utc::now();
        let conn = self.writer();
        conn.execute(
            "INSERT INTO sessions (id, agent_type, agent_id, goal, started_at, state)
             VALUES (?1, ?2, ?3, ?4, ?5, 'active')",
            params![id, agent_type, agent_id, goal, now.to_rfc3339()],
        )?;
        drop(conn);
        self.get_session(&id)
    }

    pub fn get_session(&self, id: &str) -> Result<Session> {
        let conn = self.reader();
        conn.query_row(
            "SELECT id, agent_type, agent_id, goal, started_at, ended_at, state, outcome, summary
             FROM sessions WHERE id = ?1",
            [id],
            row_to_session,
        )
        .optional()?
        .ok_or_else(|| EngineError::NotFound(format!("session not found: {id}")))
    }

    pub fn end_session(&self, id: &str, outcome: &str, summary: Option<&str>) -> Result<Session> {
        let conn = self.writer();
        let affected = conn.execute(
            "UPDATE sessions SET state = 'ended', ended_at = ?1, outcome = ?2, summary = ?3 WHERE id = ?4",
            params![Utc::now().to_rfc3339(), outcome, summary, id],
        )?;
        drop(conn);
        if affected == 0 {
            return Err(EngineError::NotFound(format!("session not found: {id}")));
        }
        self.get_session(id)
    }

    pub fn log_activity(&self, session_id: &str, activity: Activity) -> Result<()> {
        let id = format!("act_{}", Uuid::new_v4().simple());
        let conn = self.writer();
        conn.execute(
            "INSERT INTO activity (id, session_id, kind, target, outcome, details, ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, session_id, activity.kind, activity.target, activity.outcome, activity.details, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn list_sessions(&self, active_only: bool, limit: i64) -> Result<Vec<Session>> {
        let conn = self.reader();
        let sql = if active_only {
            "SELECT id, agent_type, agent_id, goal, started_at, ended_at, state, outcome, summary
             FROM sessions WHERE state = 'active' ORDER BY started_at DESC LIMIT ?1"
        } else {
            "SELECT id, agent_type, agent_id, goal, started_at, ended_at, state, outcome, summary
             FROM sessions ORDER BY started_at DESC LIMIT ?1"
        };
        let mut stmt = conn.prepare(sql)?;
        let sessions = stmt.query_map([limit], row_to_session)?.collect::<rusqlite::Result<_>>()?;
        Ok(sessions)
    }

    /// Sessions whose state is `active` and whose most recent activity
    /// falls within `window` of now.
    pub fn active_agents(&self, window: ChronoDuration) -> Result<Vec<Session>> {
        let cutoff = (Utc::now() - window).to_rfc3339();
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.agent_type, s.agent_id, s.goal, s.started_at, s.ended_at, s.state, s.outcome, s.summary
             FROM sessions s
             WHERE s.state = 'active'
             AND EXISTS (SELECT 1 FROM activity a WHERE a.session_id = s.id AND a.ts >= ?1)",
        )?;
        let sessions = stmt.query_map([cutoff], row_to_session)?.collect::<rusqlite::Result<_>>()?;
        Ok(sessions)
    }

    /// Whether another active session touched `path` within `window`.
    pub fn check_conflict(&self, session_id: &str, path: &str, window: ChronoDuration) -> Result<Option<Conflict>> {
        let cutoff = (Utc::now() - window).to_rfc3339();
        let conn = self.reader();
        let result = conn
            .query_row(
                "SELECT s.id, s.agent_type, a.ts
                 FROM activity a
                 JOIN sessions s ON s.id = a.session_id
                 WHERE a.target = ?1 AND a.kind = 'file_edit' AND s.state = 'active'
                 AND s.id != ?2 AND a.ts >= ?3
                 ORDER BY a.ts DESC LIMIT 1",
                params![path, session_id, cutoff],
                |row| {
                    let ts: DateTime<Utc> = row.get(2)?;
                    Ok(Conflict { session_id: row.get(0)?, agent_type: row.get(1)?, last_touched_at: ts })
                },
            )
            .optional()?;
        Ok(result)
    }

    pub fn file_intel(&self, path: &str) -> Result<FileIntel> {
        let conn = self.reader();
        let edit_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM activity WHERE target = ?1 AND kind = 'file_edit'",
            [path],
            |row| row.get(0),
        )?;
        let last_edit_ts: Option<DateTime<Utc>> = conn
            .query_row(
                "SELECT MAX(ts) FROM activity WHERE target = ?1 AND kind = 'file_edit'",
                [path],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        let failure_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM activity WHERE target = ?1 AND kind = 'file_edit' AND outcome = 'failure'",
            [path],
            |row| row.get(0),
        )?;
        let day_ago = (Utc::now() - ChronoDuration::hours(24)).to_rfc3339();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT s.agent_type FROM activity a JOIN sessions s ON s.id = a.session_id
             WHERE a.target = ?1 AND a.kind = 'file_edit' AND a.ts >= ?2",
        )?;
        let recent_agents: Vec<String> = stmt
            .query_map(params![path, day_ago], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        let failure_rate = if edit_count == 0 { 0.0 } else { failure_count as f64 / edit_count as f64 };

        Ok(FileIntel { path: path.to_string(), edit_count, last_edit_ts, failure_rate, recent_agents })
    }

    /// Convenience shortcut: log a `file_edit` activity and return the
    /// refreshed intel for `path`.
    pub fn record_file_edit(&self, session_id: &str, path: &str, outcome: &str) -> Result<FileIntel> {
        self.log_activity(
            session_id,
            Activity { kind: "file_edit".to_string(), target: path.to_string(), outcome: outcome.to_string(), details: None },
        )?;
        self.file_intel(path)
    }

    pub fn file_hotspots(&self, n: usize) -> Result<Vec<FileIntel>> {
        let conn = self.reader();
        let mut stmt = conn.prepare("SELECT DISTINCT target FROM activity WHERE kind = 'file_edit'")?;
        let paths: Vec<String> = stmt.query_map([], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        drop(conn);

        let mut intel: Vec<FileIntel> = paths.iter().map(|p| self.file_intel(p)).collect::<Result<_>>()?;
        intel.sort_by(|a, b| {
            let a_score = a.edit_count as f64 * (1.0 + a.failure_rate);
            let b_score = b.edit_count as f64 * (1.0 + b.failure_rate);
            b_score.partial_cmp(&a_score).unwrap_or(std::cmp::Ordering::Equal)
        });
        intel.truncate(n);
        Ok(intel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> (Storage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open_temp(dir.path()).unwrap();
        (storage, dir)
    }

    #[test]
    fn start_then_end_session_round_trips() {
        let (storage, _dir) = test_storage();
        let session = storage.start_session("coding-agent", None, Some("fix bug")).unwrap();
        assert_eq!(session.state, "active");
        let ended = storage.end_session(&session.id, "success", Some("done")).unwrap();
        assert_eq!(ended.state, "ended");
        assert_eq!(ended.outcome.as_deref(), Some("success"));
    }

    #[test]
    fn conflict_detected_for_concurrent_edit() {
        let (storage, _dir) = test_storage();
        let a = storage.start_session("agent-a", None, None).unwrap();
        let b = storage.start_session("agent-b", None, None).unwrap();
        storage.record_file_edit(&a.id, "src/main.rs", "success").unwrap();

        let conflict = storage.check_conflict(&b.id, "src/main.rs", ChronoDuration::minutes(5)).unwrap();
        assert!(conflict.is_some());
        assert_eq!(conflict.unwrap().session_id, a.id);
    }

    #[test]
    fn file_intel_tracks_failure_rate() {
        let (storage, _dir) = test_storage();
        let session = storage.start_session("agent-a", None, None).unwrap();
        storage.record_file_edit(&session.id, "src/x.rs", "success").unwrap();
        storage.record_file_edit(&session.id, "src/x.rs", "failure").unwrap();

        let intel = storage.file_intel("src/x.rs").unwrap();
        assert_eq!(intel.edit_count, 2);
        assert!((intel.failure_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn hotspots_rank_by_edits_weighted_by_failure_rate() {
        let (storage, _dir) = test_storage();
        let session = storage.start_session("agent-a", None, None).unwrap();
        storage.record_file_edit(&session.id, "src/stable.rs", "success").unwrap();
        storage.record_file_edit(&session.id, "src/flaky.rs", "failure").unwrap();
        storage.record_file_edit(&session.id, "src/flaky.rs", "failure").unwrap();

        let hotspots = storage.file_hotspots(2).unwrap();
        assert_eq!(hotspots[0].path, "src/flaky.rs");
    }
}
