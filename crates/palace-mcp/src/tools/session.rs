//! `session`: agent session lifecycle, activity logging, and file-edit
//! conflict detection.

use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{invalid_action, missing_arg, parse_args, Context, ToolError};
use palace_core::session::Activity;

const TOOL: &str = "session";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["start", "end", "log", "conflict", "list", "resume", "status"]},
            "id": {"type": "string"},
            "agentType": {"type": "string"},
            "agentId": {"type": "string"},
            "goal": {"type": "string"},
            "outcome": {"type": "string"},
            "summary": {"type": "string"},
            "kind": {"type": "string"},
            "target": {"type": "string"},
            "details": {"type": "string"},
            "path": {"type": "string"},
            "activeOnly": {"type": "boolean"},
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
    agent_type: Option<String>,
    agent_id: Option<String>,
    goal: Option<String>,
    outcome: Option<String>,
    summary: Option<String>,
    kind: Option<String>,
    target: Option<String>,
    details: Option<String>,
    path: Option<String>,
    #[serde(default)]
    active_only: bool,
    limit: Option<i64>,
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let args: Args = parse_args(arguments)?;
    let action = args.action.clone().ok_or_else(|| missing_arg(TOOL, "action"))?;

    match action.as_str() {
        "start" => start(ctx, &args),
        "end" => end(ctx, &args),
        "log" => log(ctx, &args),
        "conflict" => conflict(ctx, &args),
        "list" => list(ctx, &args),
        "resume" => resume(ctx, &args),
        "status" => status(ctx, &args),
        other => Err(invalid_action(TOOL, other)),
    }
}

fn start(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let agent_type = args.agent_type.as_deref().ok_or_else(|| missing_arg(TOOL, "agentType"))?;
    let session = ctx.storage.start_session(agent_type, args.agent_id.as_deref(), args.goal.as_deref())?;
    Ok(serde_json::to_value(session)?)
}

fn end(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let outcome = args.outcome.as_deref().unwrap_or("completed");
    Ok(serde_json::to_value(ctx.storage.end_session(id, outcome, args.summary.as_deref())?)?)
}

fn log(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let session_id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let kind = args.kind.as_deref().ok_or_else(|| missing_arg(TOOL, "kind"))?;
    let target = args.target.as_deref().ok_or_else(|| missing_arg(TOOL, "target"))?;
    let activity = Activity {
        kind: kind.to_string(),
        target: target.to_string(),
        outcome: args.outcome.clone().unwrap_or_else(|| "success".to_string()),
        details: args.details.clone(),
    };
    ctx.storage.log_activity(session_id, activity)?;
    Ok(json!({"logged": true}))
}

fn conflict(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let session_id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let path = args.path.as_deref().ok_or_else(|| missing_arg(TOOL, "path"))?;
    let window = ChronoDuration::from_std(ctx.config.conflict_window).unwrap_or(ChronoDuration::minutes(5));
    let conflict = ctx.storage.check_conflict(session_id, path, window)?;
    Ok(json!({"conflict": conflict}))
}

fn list(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let limit = args.limit.unwrap_or(20);
    Ok(json!({"sessions": ctx.storage.list_sessions(args.active_only, limit)?}))
}

fn resume(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    Ok(serde_json::to_value(ctx.storage.get_session(id)?)?)
}

fn status(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    if let Some(id) = &args.id {
        return Ok(serde_json::to_value(ctx.storage.get_session(id)?)?);
    }
    let window = ChronoDuration::from_std(ctx.config.conflict_window).unwrap_or(ChronoDuration::minutes(5));
    Ok(json!({"activeAgents": ctx.storage.active_agents(window)?}))
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
        let config = Config::from_env(dir.path().to_path_buf(), false);
        (Context { storage, corridor, rooms, embedder: None, llm: None, pipeline: None, config }, dir)
    }

    #[tokio::test]
    async fn start_then_log_then_end() {
        let (ctx, _dir) = test_ctx();
        let session = execute(&ctx, Some(json!({"action": "start", "agentType": "coder", "goal": "fix bug"}))).await.unwrap();
        let id = session["id"].as_str().unwrap().to_string();

        let logged = execute(
            &ctx,
            Some(json!({"action": "log", "id": id, "kind": "edit", "target": "src/main.rs"})),
        )
        .await
        .unwrap();
        assert_eq!(logged["logged"], true);

        let ended = execute(&ctx, Some(json!({"action": "end", "id": id, "outcome": "completed"}))).await.unwrap();
        assert_eq!(ended["outcome"], "completed");
    }

    #[tokio::test]
    async fn conflict_detects_a_recent_edit_by_another_session() {
        let (ctx, _dir) = test_ctx();
        let a = execute(&ctx, Some(json!({"action": "start", "agentType": "coder"}))).await.unwrap();
        let a_id = a["id"].as_str().unwrap().to_string();
        execute(&ctx, Some(json!({"action": "log", "id": a_id, "kind": "file_edit", "target": "src/lib.rs"})))
            .await
            .unwrap();

        let b = execute(&ctx, Some(json!({"action": "start", "agentType": "reviewer"}))).await.unwrap();
        let b_id = b["id"].as_str().unwrap().to_string();
        let result = execute(&ctx, Some(json!({"action": "conflict", "id": b_id, "path": "src/lib.rs"}))).await.unwrap();
        assert_eq!(result["conflict"]["sessionId"], a_id);
    }

    #[tokio::test]
    async fn start_without_agent_type_is_an_error() {
        let (ctx, _dir) = test_ctx();
        let err = execute(&ctx, Some(json!({"action": "start"}))).await.unwrap_err();
        assert!(matches!(err, ToolError::Engine(palace_core::EngineError::InvalidArgument(_))));
    }
}
