//! Record types for the knowledge store (component D).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five record variants the knowledge store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Idea,
    Decision,
    Learning,
    Postmortem,
    Conversation,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Idea => "idea",
            RecordKind::Decision => "decision",
            RecordKind::Learning => "learning",
            RecordKind::Postmortem => "postmortem",
            RecordKind::Conversation => "conversation",
        }
    }

    /// The id prefix used for newly minted records of this kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            RecordKind::Idea => "i_",
            RecordKind::Decision => "d_",
            RecordKind::Learning => "l_",
            RecordKind::Postmortem => "pm_",
            RecordKind::Conversation => "conv_",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idea" => Some(RecordKind::Idea),
            "decision" => Some(RecordKind::Decision),
            "learning" => Some(RecordKind::Learning),
            "postmortem" => Some(RecordKind::Postmortem),
            "conversation" => Some(RecordKind::Conversation),
            _ => None,
        }
    }
}

/// The scope a record is anchored at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Palace,
    Room,
    File,
}

impl Scope {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "palace" => Some(Scope::Palace),
            "room" => Some(Scope::Room),
            "file" => Some(Scope::File),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Palace => "palace",
            Scope::Room => "room",
            Scope::File => "file",
        }
    }
}

/// Authority lifecycle state, per §4.D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    Proposed,
    Approved,
    Rejected,
    Obsolete,
    Archived,
}

impl Authority {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "proposed" => Some(Authority::Proposed),
            "approved" => Some(Authority::Approved),
            "rejected" => Some(Authority::Rejected),
            "obsolete" => Some(Authority::Obsolete),
            "archived" => Some(Authority::Archived),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Authority::Proposed => "proposed",
            Authority::Approved => "approved",
            Authority::Rejected => "rejected",
            Authority::Obsolete => "obsolete",
            Authority::Archived => "archived",
        }
    }
}

/// Decision outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failed,
    Mixed,
}

impl Outcome {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Outcome::Success),
            "failed" => Some(Outcome::Failed),
            "mixed" => Some(Outcome::Mixed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::Mixed => "mixed",
        }
    }
}

/// A single conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// A durable knowledge record. All variants share the common fields;
/// variant-specific fields are `None` unless `kind` matches.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub kind: RecordKind,
    pub content: String,
    pub scope: Scope,
    pub scope_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub status: String,
    pub authority: Authority,
    pub confidence: f64,
    pub last_access_at: DateTime<Utc>,

    // Decision
    pub rationale: Option<String>,
    pub outcome: Option<Outcome>,
    pub outcome_note: Option<String>,

    // Learning
    pub obsolete_reason: Option<String>,

    // Postmortem
    pub title: Option<String>,
    pub what_happened: Option<String>,
    pub root_cause: Option<String>,
    pub lessons_learned: Vec<String>,
    pub prevention_steps: Vec<String>,
    pub severity: Option<String>,
    pub affected_files: Vec<String>,
    pub related_decision: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,

    // Conversation
    pub summary: Option<String>,
    pub messages: Vec<Message>,
    pub session_id: Option<String>,
}

impl Record {
    /// Clamp confidence into the documented `[0,1]` range.
    pub fn clamp_confidence(value: f64) -> f64 {
        value.clamp(0.0, 1.0)
    }
}

/// Input accepted by `store`. `kind` is optional: when absent it is
/// inferred from the shape of the content (see `infer_kind`).
/// `deny_unknown_fields` rejects field-injection from untrusted callers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecordInput {
    pub content: String,
    pub kind: Option<String>,
    pub scope: Option<String>,
    pub scope_path: Option<String>,
    pub tags: Option<Vec<String>>,
    pub direct: Option<bool>,

    pub rationale: Option<String>,
    pub title: Option<String>,
    pub what_happened: Option<String>,
    pub root_cause: Option<String>,
    pub lessons_learned: Option<Vec<String>>,
    pub prevention_steps: Option<Vec<String>>,
    pub severity: Option<String>,
    pub affected_files: Option<Vec<String>>,
    pub related_decision: Option<String>,
    pub summary: Option<String>,
    pub messages: Option<Vec<Message>>,
    pub session_id: Option<String>,
}

/// Infer a record's kind from the fields present on its input, per the
/// "type inferred" contract of the `store` tool.
pub fn infer_kind(input: &RecordInput) -> RecordKind {
    if input.title.is_some() || input.what_happened.is_some() || input.root_cause.is_some() {
        return RecordKind::Postmortem;
    }
    if input.messages.is_some() {
        return RecordKind::Conversation;
    }
    if input.rationale.is_some() {
        return RecordKind::Decision;
    }
    if input.obsolete_reason_present() {
        return RecordKind::Learning;
    }
    RecordKind::Idea
}

impl RecordInput {
    fn obsolete_reason_present(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_clamps_to_unit_interval() {
        assert_eq!(Record::clamp_confidence(1.5), 1.0);
        assert_eq!(Record::clamp_confidence(-0.2), 0.0);
        assert_eq!(Record::clamp_confidence(0.4), 0.4);
    }

    #[test]
    fn infer_kind_prefers_postmortem_signals() {
        let input = RecordInput {
            content: "outage".into(),
            title: Some("DB outage".into()),
            ..Default::default()
        };
        assert_eq!(infer_kind(&input), RecordKind::Postmortem);
    }

    #[test]
    fn infer_kind_defaults_to_idea() {
        let input = RecordInput {
            content: "maybe we should cache this".into(),
            ..Default::default()
        };
        assert_eq!(infer_kind(&input), RecordKind::Idea);
    }

    #[test]
    fn deny_unknown_fields_rejects_injection() {
        let raw = serde_json::json!({
            "content": "hello",
            "maliciousField": "x"
        });
        let result: Result<RecordInput, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }
}
