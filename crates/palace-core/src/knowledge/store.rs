//! Knowledge store operations (component D): CRUD, scope chain, links,
//! authority lifecycle, outcome feedback, decay.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::rooms::RoomCache;
use crate::storage::Storage;

use super::record::{infer_kind, Authority, Message, Outcome, Record, RecordInput, RecordKind, Scope};

/// A directed relationship between two records (or a record and a code reference).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub relation: String,
}

/// Direction filter for `links()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Outgoing,
    Incoming,
    Both,
}

/// Filter applied by `list()`.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub authority: Option<Authority>,
    pub scope: Option<Scope>,
    pub scope_path: Option<String>,
    pub limit: Option<i64>,
}

/// A patch applied by `update()`. Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// The set of records affected by a would-be decay sweep, or actually
/// affected by one.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayEntry {
    pub id: String,
    pub previous_confidence: f64,
    pub new_confidence: f64,
}

fn row_to_record(row: &Row) -> rusqlite::Result<Record> {
    let kind_str: String = row.get("kind")?;
    let kind = RecordKind::parse(&kind_str).unwrap_or(RecordKind::Idea);
    let scope_str: String = row.get("scope")?;
    let scope = Scope::parse(&scope_str).unwrap_or(Scope::Palace);
    let authority_str: String = row.get("authority")?;
    let authority = Authority::parse(&authority_str).unwrap_or(Authority::Proposed);
    let tags_json: String = row.get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    let outcome_str: Option<String> = row.get("outcome")?;
    let lessons_json: Option<String> = row.get("lessons_learned")?;
    let prevention_json: Option<String> = row.get("prevention_steps")?;
    let affected_json: Option<String> = row.get("affected_files")?;
    let messages_json: Option<String> = row.get("messages")?;

    Ok(Record {
        id: row.get("id")?,
        kind,
        content: row.get("content")?,
        scope,
        scope_path: row.get("scope_path")?,
        created_at: row.get("created_at")?,
        tags,
        status: row.get("status")?,
        authority,
        confidence: row.get("confidence")?,
        last_access_at: row.get("last_access_at")?,
        rationale: row.get("rationale")?,
        outcome: outcome_str.and_then(|s| Outcome::parse(&s)),
        outcome_note: row.get("outcome_note")?,
        obsolete_reason: row.get("obsolete_reason")?,
        title: row.get("title")?,
        what_happened: row.get("what_happened")?,
        root_cause: row.get("root_cause")?,
        lessons_learned: lessons_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        prevention_steps: prevention_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        severity: row.get("severity")?,
        affected_files: affected_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        related_decision: row.get("related_decision")?,
        resolved_at: row.get("resolved_at")?,
        summary: row.get("summary")?,
        messages: messages_json
            .and_then(|s| serde_json::from_str::<Vec<Message>>(&s).ok())
            .unwrap_or_default(),
        session_id: row.get("session_id")?,
    })
}

const RECORD_COLUMNS: &str = "id, kind, content, scope, scope_path, created_at, tags, status,
     authority, confidence, last_access_at, rationale, outcome, outcome_note,
     obsolete_reason, title, what_happened, root_cause, lessons_learned,
     prevention_steps, severity, affected_files, related_decision, resolved_at,
     summary, messages, session_id";

impl Storage {
    /// Add a new record. Non-admin callers that would land on `approved`
    /// authority are redirected to `proposed` plus a `Proposal` row;
    /// `direct=true` writes (admin mode only, enforced by the dispatcher)
    /// go straight to `approved`.
    pub fn add_record(&self, input: RecordInput, admin: bool) -> Result<Record> {
        if input.content.trim().is_empty() {
            return Err(EngineError::InvalidArgument("content must not be empty".into()));
        }

        let kind = input
            .kind
            .as_deref()
            .and_then(RecordKind::parse)
            .unwrap_or_else(|| infer_kind(&input));

        let scope = input
            .scope
            .as_deref()
            .and_then(Scope::parse)
            .unwrap_or(Scope::Palace);

        if scope != Scope::Palace && input.scope_path.is_none() {
            return Err(EngineError::InvalidArgument(
                "scope_path is required for non-palace scope".into(),
            ));
        }

        let direct = input.direct.unwrap_or(false);
        if direct && !admin {
            return Err(EngineError::PermissionDenied(
                "direct=true requires admin mode".into(),
            ));
        }

        let now = Utc::now();
        let id = format!("{}{}", kind.id_prefix(), Uuid::new_v4().simple());
        let authority = if direct { Authority::Approved } else { Authority::Proposed };

        let tags = input.tags.clone().unwrap_or_default();

        {
            let conn = self.writer();
            conn.execute(
                "INSERT INTO records (
                    id, kind, content, scope, scope_path, created_at, tags, status,
                    authority, confidence, last_access_at, rationale, title,
                    what_happened, root_cause, lessons_learned, prevention_steps,
                    severity, affected_files, related_decision, summary, messages, session_id
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23)",
                params![
                    id,
                    kind.as_str(),
                    input.content,
                    scope.as_str(),
                    input.scope_path,
                    now.to_rfc3339(),
                    serde_json::to_string(&tags).unwrap(),
                    "open",
                    authority.as_str(),
                    0.5_f64,
                    now.to_rfc3339(),
                    input.rationale,
                    input.title,
                    input.what_happened,
                    input.root_cause,
                    input.lessons_learned.as_ref().map(|v| serde_json::to_string(v).unwrap()),
                    input.prevention_steps.as_ref().map(|v| serde_json::to_string(v).unwrap()),
                    input.severity,
                    input.affected_files.as_ref().map(|v| serde_json::to_string(v).unwrap()),
                    input.related_decision,
                    input.summary,
                    input.messages.as_ref().map(|v| serde_json::to_string(v).unwrap()),
                    input.session_id,
                ],
            )?;

            if !direct {
                let proposal_id = format!("prop_{}", Uuid::new_v4().simple());
                conn.execute(
                    "INSERT INTO proposals (id, record_id, created_at) VALUES (?1, ?2, ?3)",
                    params![proposal_id, id, now.to_rfc3339()],
                )?;
            }
        }

        self.get_record(&id)
    }

    pub fn get_record(&self, id: &str) -> Result<Record> {
        let conn = self.reader();
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1");
        conn.query_row(&sql, [id], row_to_record)
            .optional()?
            .ok_or_else(|| EngineError::NotFound(format!("record not found: {id}")))
    }

    pub fn list_records(&self, kind: Option<RecordKind>, filter: RecordFilter) -> Result<Vec<Record>> {
        let conn = self.reader();
        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE 1=1");
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(kind) = kind {
            sql.push_str(" AND kind = ?");
            sql_params.push(Box::new(kind.as_str().to_string()));
        }
        if let Some(authority) = filter.authority {
            sql.push_str(" AND authority = ?");
            sql_params.push(Box::new(authority.as_str().to_string()));
        }
        if let Some(scope) = filter.scope {
            sql.push_str(" AND scope = ?");
            sql_params.push(Box::new(scope.as_str().to_string()));
        }
        if let Some(scope_path) = &filter.scope_path {
            sql.push_str(" AND scope_path = ?");
            sql_params.push(Box::new(scope_path.clone()));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = sql_params.iter().map(|b| b.as_ref()).collect();
        let records = stmt
            .query_map(param_refs.as_slice(), row_to_record)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(records)
    }

    pub fn update_record(&self, id: &str, patch: RecordPatch) -> Result<Record> {
        let conn = self.writer();
        if let Some(content) = patch.content {
            conn.execute("UPDATE records SET content = ?1 WHERE id = ?2", params![content, id])?;
        }
        if let Some(tags) = patch.tags {
            conn.execute(
                "UPDATE records SET tags = ?1 WHERE id = ?2",
                params![serde_json::to_string(&tags).unwrap(), id],
            )?;
        }
        if let Some(status) = patch.status {
            conn.execute("UPDATE records SET status = ?1 WHERE id = ?2", params![status, id])?;
        }
        if let Some(resolved_at) = patch.resolved_at {
            conn.execute("UPDATE records SET resolved_at = ?1 WHERE id = ?2", params![resolved_at, id])?;
        }
        drop(conn);
        self.get_record(id)
    }

    /// Link two records (or a record and a code reference). Idempotent:
    /// a repeat call with the same `(source, target, relation)` returns
    /// the existing link id rather than erroring.
    pub fn link(&self, source_id: &str, target_id: &str, relation: &str) -> Result<Link> {
        if source_id == target_id {
            return Err(EngineError::InvalidArgument("a record cannot link to itself".into()));
        }

        let conn = self.writer();
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM links WHERE source_id = ?1 AND target_id = ?2 AND relation = ?3",
                params![source_id, target_id, relation],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                let id = format!("lnk_{}", Uuid::new_v4().simple());
                conn.execute(
                    "INSERT INTO links (id, source_id, target_id, relation) VALUES (?1,?2,?3,?4)",
                    params![id, source_id, target_id, relation],
                )?;
                id
            }
        };

        Ok(Link {
            id,
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            relation: relation.to_string(),
        })
    }

    pub fn unlink(&self, link_id: &str) -> Result<()> {
        let conn = self.writer();
        let affected = conn.execute("DELETE FROM links WHERE id = ?1", [link_id])?;
        if affected == 0 {
            return Err(EngineError::NotFound(format!("link not found: {link_id}")));
        }
        Ok(())
    }

    pub fn links(&self, id: &str, direction: LinkDirection) -> Result<Vec<Link>> {
        let conn = self.reader();
        let sql = match direction {
            LinkDirection::Outgoing => "SELECT id, source_id, target_id, relation FROM links WHERE source_id = ?1",
            LinkDirection::Incoming => "SELECT id, source_id, target_id, relation FROM links WHERE target_id = ?1",
            LinkDirection::Both => {
                "SELECT id, source_id, target_id, relation FROM links WHERE source_id = ?1 OR target_id = ?1"
            }
        };
        let mut stmt = conn.prepare(sql)?;
        let links = stmt
            .query_map([id], |row| {
                Ok(Link {
                    id: row.get(0)?,
                    source_id: row.get(1)?,
                    target_id: row.get(2)?,
                    relation: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(links)
    }

    /// Record a decision's outcome and propagate confidence adjustments
    /// to every linked Learning, per §4.D.
    pub fn record_outcome(&self, decision_id: &str, outcome: Outcome, note: Option<&str>) -> Result<Record> {
        {
            let conn = self.writer();
            conn.execute(
                "UPDATE records SET outcome = ?1, outcome_note = ?2 WHERE id = ?3 AND kind = 'decision'",
                params![outcome.as_str(), note, decision_id],
            )?;
        }

        let linked = self.links(decision_id, LinkDirection::Both)?;
        let now = Utc::now().to_rfc3339();
        for link in linked {
            let other = if link.source_id == decision_id { link.target_id } else { link.source_id };
            let conn = self.writer();
            let is_learning: Option<String> = conn
                .query_row("SELECT kind FROM records WHERE id = ?1 AND kind = 'learning'", [&other], |r| r.get(0))
                .optional()?;
            if is_learning.is_none() {
                continue;
            }
            let confidence: f64 = conn.query_row("SELECT confidence FROM records WHERE id = ?1", [&other], |r| r.get(0))?;
            let new_confidence = match outcome {
                Outcome::Success => Record::clamp_confidence(confidence + 0.1),
                Outcome::Failed => Record::clamp_confidence(confidence - 0.2),
                Outcome::Mixed => confidence,
            };
            conn.execute(
                "UPDATE records SET confidence = ?1, last_access_at = ?2 WHERE id = ?3",
                params![new_confidence, now, other],
            )?;
        }

        self.get_record(decision_id)
    }

    pub fn reinforce(&self, id: &str) -> Result<Record> {
        let conn = self.writer();
        let now = Utc::now().to_rfc3339();
        let affected = conn.execute("UPDATE records SET last_access_at = ?1 WHERE id = ?2", params![now, id])?;
        drop(conn);
        if affected == 0 {
            return Err(EngineError::NotFound(format!("record not found: {id}")));
        }
        self.get_record(id)
    }

    pub fn boost(&self, id: &str, delta: f64) -> Result<Record> {
        let record = self.get_record(id)?;
        let new_confidence = Record::clamp_confidence(record.confidence + delta);
        let conn = self.writer();
        conn.execute("UPDATE records SET confidence = ?1 WHERE id = ?2", params![new_confidence, id])?;
        drop(conn);
        self.get_record(id)
    }

    pub fn mark_obsolete(&self, id: &str, reason: &str) -> Result<Record> {
        let conn = self.writer();
        conn.execute(
            "UPDATE records SET authority = 'obsolete', obsolete_reason = ?1 WHERE id = ?2 AND authority = 'approved'",
            params![reason, id],
        )?;
        drop(conn);
        self.get_record(id)
    }

    /// Preview (no writes) or apply a decay sweep. `now` is passed in so
    /// callers/tests control the clock.
    pub fn decay_preview(&self, now: DateTime<Utc>, stale_after: ChronoDuration, lambda_per_day: f64) -> Result<Vec<DecayEntry>> {
        self.decay_sweep(now, stale_after, lambda_per_day, false)
    }

    pub fn decay_apply(&self, now: DateTime<Utc>, stale_after: ChronoDuration, lambda_per_day: f64) -> Result<Vec<DecayEntry>> {
        self.decay_sweep(now, stale_after, lambda_per_day, true)
    }

    fn decay_sweep(
        &self,
        now: DateTime<Utc>,
        stale_after: ChronoDuration,
        lambda_per_day: f64,
        write: bool,
    ) -> Result<Vec<DecayEntry>> {
        let cutoff = now - stale_after;
        let conn = self.reader();
        let mut stmt = conn.prepare("SELECT id, confidence, last_access_at FROM records WHERE authority = 'approved'")?;
        let rows: Vec<(String, f64, DateTime<Utc>)> = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?, row.get::<_, DateTime<Utc>>(2)?))
            })?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        drop(conn);

        let mut entries = Vec::new();
        for (id, confidence, last_access_at) in rows {
            if last_access_at >= cutoff {
                continue;
            }
            let stale_days = (now - last_access_at).num_days().max(0) as f64;
            let new_confidence = (confidence - lambda_per_day * stale_days).max(0.0);
            if new_confidence < confidence {
                entries.push(DecayEntry { id: id.clone(), previous_confidence: confidence, new_confidence });
                if write {
                    let conn = self.writer();
                    conn.execute("UPDATE records SET confidence = ?1 WHERE id = ?2", params![new_confidence, id])?;
                }
            }
        }

        Ok(entries)
    }

    pub fn archive(&self, unused_days: i64, max_confidence: f64) -> Result<Vec<String>> {
        let cutoff = (Utc::now() - ChronoDuration::days(unused_days)).to_rfc3339();
        let conn = self.writer();
        let mut stmt = conn.prepare(
            "SELECT id FROM records WHERE authority IN ('approved','obsolete')
             AND last_access_at < ?1 AND confidence <= ?2",
        )?;
        let ids: Vec<String> = stmt
            .query_map(params![cutoff, max_confidence], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        for id in &ids {
            conn.execute("UPDATE records SET authority = 'archived' WHERE id = ?1", [id])?;
        }
        Ok(ids)
    }

    /// Scope chain resolution (§4.D): `file(P) -> room(R(P)) -> palace`.
    /// The corridor hop is a second `Storage` the caller queries separately.
    pub fn authoritative_state(
        &self,
        rooms: &RoomCache,
        scope_path: Option<&str>,
        decision_cap: i64,
        learning_cap: i64,
        max_content_len: usize,
    ) -> Result<Vec<Record>> {
        let mut out = Vec::new();

        if let Some(path) = scope_path {
            out.extend(self.records_at_scope_path(path, decision_cap, learning_cap)?);
            if let Some(room) = rooms.room_for_path(path) {
                out.extend(self.records_at_scope_path(&room.name, decision_cap, learning_cap)?);
            }
        }
        out.extend(self.list_records(
            None,
            RecordFilter { authority: Some(Authority::Approved), scope: Some(Scope::Palace), ..Default::default() },
        )?);

        for record in &mut out {
            if record.content.len() > max_content_len {
                record.content.truncate(max_content_len);
            }
        }

        Ok(out)
    }

    fn records_at_scope_path(&self, scope_path: &str, decision_cap: i64, learning_cap: i64) -> Result<Vec<Record>> {
        let mut out = self.list_records(
            Some(RecordKind::Decision),
            RecordFilter {
                authority: Some(Authority::Approved),
                scope_path: Some(scope_path.to_string()),
                limit: Some(decision_cap),
                ..Default::default()
            },
        )?;
        out.extend(self.list_records(
            Some(RecordKind::Learning),
            RecordFilter {
                authority: Some(Authority::Approved),
                scope_path: Some(scope_path.to_string()),
                limit: Some(learning_cap),
                ..Default::default()
            },
        )?);
        Ok(out)
    }

    /// Approve a proposal: promote its record to `approved` authority.
    pub fn approve_proposal(&self, proposal_id: &str) -> Result<Record> {
        let conn = self.writer();
        let record_id: String = conn
            .query_row("SELECT record_id FROM proposals WHERE id = ?1", [proposal_id], |r| r.get(0))
            .optional()?
            .ok_or_else(|| EngineError::NotFound(format!("proposal not found: {proposal_id}")))?;
        conn.execute("UPDATE records SET authority = 'approved' WHERE id = ?1", [&record_id])?;
        conn.execute("DELETE FROM proposals WHERE id = ?1", [proposal_id])?;
        drop(conn);
        self.get_record(&record_id)
    }

    pub fn reject_proposal(&self, proposal_id: &str) -> Result<Record> {
        let conn = self.writer();
        let record_id: String = conn
            .query_row("SELECT record_id FROM proposals WHERE id = ?1", [proposal_id], |r| r.get(0))
            .optional()?
            .ok_or_else(|| EngineError::NotFound(format!("proposal not found: {proposal_id}")))?;
        conn.execute("UPDATE records SET authority = 'rejected' WHERE id = ?1", [&record_id])?;
        conn.execute("DELETE FROM proposals WHERE id = ?1", [proposal_id])?;
        drop(conn);
        self.get_record(&record_id)
    }

    pub fn list_proposals(&self) -> Result<Vec<(String, Record)>> {
        let conn = self.reader();
        let mut stmt = conn.prepare("SELECT id, record_id FROM proposals ORDER BY created_at ASC")?;
        let ids: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        drop(conn);
        ids.into_iter()
            .map(|(proposal_id, record_id)| Ok((proposal_id, self.get_record(&record_id)?)))
            .collect()
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

    fn idea_input(content: &str) -> RecordInput {
        RecordInput { content: content.to_string(), ..Default::default() }
    }

    #[test]
    fn add_then_get_round_trips_modulo_server_fields() {
        let (storage, _dir) = test_storage();
        let record = storage.add_record(idea_input("cache invalidation is hard"), false).unwrap();
        let fetched = storage.get_record(&record.id).unwrap();
        assert_eq!(fetched.content, "cache invalidation is hard");
        assert_eq!(fetched.authority, Authority::Proposed);
    }

    #[test]
    fn non_admin_store_creates_proposal_not_approved() {
        let (storage, _dir) = test_storage();
        let record = storage.add_record(idea_input("x"), false).unwrap();
        assert_eq!(record.authority, Authority::Proposed);

        let filtered = storage
            .list_records(None, RecordFilter { authority: Some(Authority::Approved), ..Default::default() })
            .unwrap();
        assert!(filtered.iter().all(|r| r.id != record.id));
    }

    #[test]
    fn direct_write_requires_admin() {
        let (storage, _dir) = test_storage();
        let mut input = idea_input("x");
        input.direct = Some(true);
        let err = storage.add_record(input, false).unwrap_err();
        assert_eq!(err.category(), "permission_denied");
    }

    #[test]
    fn approve_promotes_proposal_to_approved() {
        let (storage, _dir) = test_storage();
        let record = storage.add_record(idea_input("x"), false).unwrap();
        let proposals = storage.list_proposals().unwrap();
        let (proposal_id, _) = proposals.iter().find(|(_, r)| r.id == record.id).unwrap();
        let promoted = storage.approve_proposal(proposal_id).unwrap();
        assert_eq!(promoted.authority, Authority::Approved);
    }

    #[test]
    fn link_is_idempotent() {
        let (storage, _dir) = test_storage();
        let a = storage.add_record(idea_input("a"), false).unwrap();
        let b = storage.add_record(idea_input("b"), false).unwrap();
        let first = storage.link(&a.id, &b.id, "related").unwrap();
        let second = storage.link(&a.id, &b.id, "related").unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn self_link_is_rejected() {
        let (storage, _dir) = test_storage();
        let a = storage.add_record(idea_input("a"), false).unwrap();
        let err = storage.link(&a.id, &a.id, "related").unwrap_err();
        assert_eq!(err.category(), "invalid_argument");
    }

    #[test]
    fn outcome_feedback_adjusts_linked_learning_confidence() {
        let (storage, _dir) = test_storage();
        let mut decision_input = idea_input("ship it");
        decision_input.rationale = Some("because deadlines".into());
        let decision = storage.add_record(decision_input, true).unwrap();

        let learning = storage.add_record(idea_input("retries need backoff"), true).unwrap();
        let conn_confidence = 0.5;
        {
            let conn = storage.writer();
            conn.execute("UPDATE records SET confidence = ?1 WHERE id = ?2", params![conn_confidence, learning.id]).unwrap();
        }
        storage.link(&decision.id, &learning.id, "supports").unwrap();

        let updated_decision = storage.record_outcome(&decision.id, Outcome::Success, None).unwrap();
        assert_eq!(updated_decision.outcome, Some(Outcome::Success));
        let updated_learning = storage.get_record(&learning.id).unwrap();
        assert!((updated_learning.confidence - 0.6).abs() < 1e-9);

        storage.record_outcome(&decision.id, Outcome::Failed, None).unwrap();
        let updated_learning = storage.get_record(&learning.id).unwrap();
        assert!((updated_learning.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn decay_preview_does_not_write() {
        let (storage, _dir) = test_storage();
        let mut input = idea_input("stale idea");
        input.direct = Some(true);
        let record = storage.add_record(input, true).unwrap();
        let long_ago = Utc::now() - ChronoDuration::days(60);
        {
            let conn = storage.writer();
            conn.execute(
                "UPDATE records SET last_access_at = ?1 WHERE id = ?2",
                params![long_ago.to_rfc3339(), record.id],
            )
            .unwrap();
        }

        let preview = storage.decay_preview(Utc::now(), ChronoDuration::days(30), 0.01).unwrap();
        assert!(preview.iter().any(|e| e.id == record.id));
        let unchanged = storage.get_record(&record.id).unwrap();
        assert_eq!(unchanged.confidence, 0.5);

        let applied = storage.decay_apply(Utc::now(), ChronoDuration::days(30), 0.01).unwrap();
        assert!(!applied.is_empty());
        let changed = storage.get_record(&record.id).unwrap();
        assert!(changed.confidence < 0.5);
    }
}
