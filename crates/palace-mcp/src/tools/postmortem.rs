//! `postmortem`: incident write-ups — create, browse, resolve, and
//! promote their lessons learned into standalone learning records.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{invalid_action, missing_arg, parse_args, Context, ToolError};
use palace_core::{RecordFilter, RecordInput, RecordKind, RecordPatch};

const TOOL: &str = "postmortem";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["create", "list", "get", "resolve", "stats", "to_learnings"]},
            "id": {"type": "string"},
            "title": {"type": "string"},
            "whatHappened": {"type": "string"},
            "rootCause": {"type": "string"},
            "lessonsLearned": {"type": "array", "items": {"type": "string"}},
            "preventionSteps": {"type": "array", "items": {"type": "string"}},
            "severity": {"type": "string"},
            "affectedFiles": {"type": "array", "items": {"type": "string"}},
            "relatedDecision": {"type": "string"},
            "scopePath": {"type": "string"},
            "limit": {"type": "integer"}
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    #[serde(default)]
    action: Option<String>,
    id: Option<String>,
    title: Option<String>,
    what_happened: Option<String>,
    root_cause: Option<String>,
    lessons_learned: Option<Vec<String>>,
    prevention_steps: Option<Vec<String>>,
    severity: Option<String>,
    affected_files: Option<Vec<String>>,
    related_decision: Option<String>,
    scope_path: Option<String>,
    limit: Option<i64>,
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let args: Args = parse_args(arguments)?;
    let action = args.action.clone().unwrap_or_else(|| "list".to_string());

    match action.as_str() {
        "create" => create(ctx, &args),
        "list" => list(ctx, &args),
        "get" => get(ctx, &args),
        "resolve" => resolve(ctx, &args),
        "stats" => stats(ctx),
        "to_learnings" => to_learnings(ctx, &args),
        other => Err(invalid_action(TOOL, other)),
    }
}

fn create(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let title = args.title.as_deref().ok_or_else(|| missing_arg(TOOL, "title"))?;
    let what_happened = args.what_happened.clone().ok_or_else(|| missing_arg(TOOL, "whatHappened"))?;

    let input = RecordInput {
        content: title.to_string(),
        kind: Some(RecordKind::Postmortem.as_str().to_string()),
        what_happened: Some(what_happened),
        root_cause: args.root_cause.clone(),
        lessons_learned: args.lessons_learned.clone(),
        prevention_steps: args.prevention_steps.clone(),
        severity: args.severity.clone(),
        affected_files: args.affected_files.clone(),
        related_decision: args.related_decision.clone(),
        scope_path: args.scope_path.clone(),
        ..Default::default()
    };
    let record = ctx.storage.add_record(input, true)?;
    Ok(serde_json::to_value(record)?)
}

fn list(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let filter = RecordFilter { scope_path: args.scope_path.clone(), limit: Some(args.limit.unwrap_or(20)), ..Default::default() };
    Ok(json!({"postmortems": ctx.storage.list_records(Some(RecordKind::Postmortem), filter)?}))
}

fn get(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    Ok(serde_json::to_value(ctx.storage.get_record(id)?)?)
}

fn resolve(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let patch = RecordPatch { resolved_at: Some(Utc::now()), ..Default::default() };
    Ok(serde_json::to_value(ctx.storage.update_record(id, patch)?)?)
}

fn stats(ctx: &Context) -> Result<Value, ToolError> {
    let all = ctx.storage.list_records(Some(RecordKind::Postmortem), RecordFilter::default())?;
    let resolved = all.iter().filter(|r| r.resolved_at.is_some()).count();
    Ok(json!({"total": all.len(), "resolved": resolved, "open": all.len() - resolved}))
}

fn to_learnings(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let postmortem = ctx.storage.get_record(id)?;
    let lessons = postmortem.lessons_learned.clone();

    let mut created = Vec::new();
    for lesson in &lessons {
        let input = RecordInput {
            content: lesson.clone(),
            kind: Some(RecordKind::Learning.as_str().to_string()),
            related_decision: postmortem.related_decision.clone(),
            scope_path: postmortem.scope_path.clone(),
            ..Default::default()
        };
        let record = ctx.storage.add_record(input, true)?;
        ctx.storage.link(&postmortem.id, &record.id, "derived_from")?;
        created.push(record);
    }
    Ok(json!({"learnings": created}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use palace_core::rooms::RoomCache;
    use palace_core::{Config, Storage};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_ctx() -> (Context, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open_temp(dir.path()).unwrap());
        let corridor = Arc::new(Storage::open_temp(dir.path()).unwrap());
        let rooms = Arc::new(RoomCache::new());
        let config = Config::from_env(dir.path().to_path_buf(), true);
        (Context { storage, corridor, rooms, embedder: None, llm: None, pipeline: None, config }, dir)
    }

    #[tokio::test]
    async fn create_bypasses_the_proposal_queue() {
        let (ctx, _dir) = test_ctx();
        let result = execute(
            &ctx,
            Some(json!({
                "action": "create",
                "title": "db outage",
                "whatHappened": "primary went down during migration",
                "lessonsLearned": ["add a health check before cutover"]
            })),
        )
        .await
        .unwrap();
        assert_eq!(result["authority"], "approved");
        assert!(ctx.storage.list_proposals().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_sets_resolved_at_and_stats_counts_it() {
        let (ctx, _dir) = test_ctx();
        let created = execute(
            &ctx,
            Some(json!({"action": "create", "title": "t", "whatHappened": "w"})),
        )
        .await
        .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let before = execute(&ctx, Some(json!({"action": "stats"}))).await.unwrap();
        assert_eq!(before["open"], 1);

        execute(&ctx, Some(json!({"action": "resolve", "id": id}))).await.unwrap();
        let after = execute(&ctx, Some(json!({"action": "stats"}))).await.unwrap();
        assert_eq!(after["resolved"], 1);
        assert_eq!(after["open"], 0);
    }

    #[tokio::test]
    async fn to_learnings_creates_and_links_one_record_per_lesson() {
        let (ctx, _dir) = test_ctx();
        let created = execute(
            &ctx,
            Some(json!({
                "action": "create",
                "title": "t",
                "whatHappened": "w",
                "lessonsLearned": ["lesson one", "lesson two"]
            })),
        )
        .await
        .unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let result = execute(&ctx, Some(json!({"action": "to_learnings", "id": id}))).await.unwrap();
        let learnings = result["learnings"].as_array().unwrap();
        assert_eq!(learnings.len(), 2);

        let links = ctx.storage.links(&id, palace_core::LinkDirection::Outgoing).unwrap();
        assert_eq!(links.len(), 2);
    }

    #[tokio::test]
    async fn create_without_title_is_an_error() {
        let (ctx, _dir) = test_ctx();
        let err = execute(&ctx, Some(json!({"action": "create", "whatHappened": "w"}))).await.unwrap_err();
        assert!(matches!(err, ToolError::Engine(palace_core::EngineError::InvalidArgument(_))));
    }
}
