//! `decay`: confidence decay over time — preview or apply the decay
//! sweep, and reinforce or boost individual records against it.

use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{invalid_action, missing_arg, parse_args, Context, ToolError};

const TOOL: &str = "decay";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["stats", "preview", "apply", "reinforce", "boost"]},
            "id": {"type": "string"},
            "delta": {"type": "number"},
            "staleAfterDays": {"type": "integer"},
            "lambdaPerDay": {"type": "number"}
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    #[serde(default)]
    action: Option<String>,
    id: Option<String>,
    delta: Option<f64>,
    stale_after_days: Option<i64>,
    lambda_per_day: Option<f64>,
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let args: Args = parse_args(arguments)?;
    let action = args.action.clone().unwrap_or_else(|| "stats".to_string());

    match action.as_str() {
        "stats" => preview(ctx, &args).map(|entries| json!({"wouldDecay": entries.len(), "entries": entries})),
        "preview" => preview(ctx, &args).map(|entries| json!({"entries": entries})),
        "apply" => apply(ctx, &args),
        "reinforce" => reinforce(ctx, &args),
        "boost" => boost(ctx, &args),
        other => Err(invalid_action(TOOL, other)),
    }
}

fn decay_params(args: &Args) -> (ChronoDuration, f64) {
    let stale_after = ChronoDuration::days(args.stale_after_days.unwrap_or(30));
    let lambda = args.lambda_per_day.unwrap_or(0.01);
    (stale_after, lambda)
}

fn preview(ctx: &Context, args: &Args) -> Result<Vec<palace_core::knowledge::DecayEntry>, ToolError> {
    let (stale_after, lambda) = decay_params(args);
    Ok(ctx.storage.decay_preview(Utc::now(), stale_after, lambda)?)
}

fn apply(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    ctx.require_admin("decay apply")?;
    let (stale_after, lambda) = decay_params(args);
    let entries = ctx.storage.decay_apply(Utc::now(), stale_after, lambda)?;
    Ok(json!({"decayed": entries}))
}

fn reinforce(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    Ok(serde_json::to_value(ctx.storage.reinforce(id)?)?)
}

fn boost(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let delta = args.delta.ok_or_else(|| missing_arg(TOOL, "delta"))?;
    Ok(serde_json::to_value(ctx.storage.boost(id, delta)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use palace_core::rooms::RoomCache;
    use palace_core::{Config, RecordInput, Storage};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_ctx(admin: bool) -> (Context, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open_temp(dir.path()).unwrap());
        let corridor = Arc::new(Storage::open_temp(dir.path()).unwrap());
        let rooms = Arc::new(RoomCache::new());
        let config = Config::from_env(dir.path().to_path_buf(), admin);
        (Context { storage, corridor, rooms, embedder: None, llm: None, pipeline: None, config }, dir)
    }

    #[tokio::test]
    async fn apply_without_admin_is_rejected() {
        let (ctx, _dir) = test_ctx(false);
        let err = execute(&ctx, Some(json!({"action": "apply"}))).await.unwrap_err();
        assert!(matches!(err, ToolError::Engine(palace_core::EngineError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn boost_raises_confidence() {
        let (ctx, _dir) = test_ctx(true);
        let record = ctx
            .storage
            .add_record(RecordInput { content: "a learning".into(), kind: Some("learning".into()), ..Default::default() }, true)
            .unwrap();

        let result = execute(&ctx, Some(json!({"action": "boost", "id": record.id, "delta": 0.1}))).await.unwrap();
        assert!(result["confidence"].as_f64().unwrap() > record.confidence);
    }

    #[tokio::test]
    async fn boost_without_delta_is_an_error() {
        let (ctx, _dir) = test_ctx(true);
        let record = ctx
            .storage
            .add_record(RecordInput { content: "a learning".into(), kind: Some("learning".into()), ..Default::default() }, true)
            .unwrap();
        let err = execute(&ctx, Some(json!({"action": "boost", "id": record.id}))).await.unwrap_err();
        assert!(matches!(err, ToolError::Engine(palace_core::EngineError::InvalidArgument(_))));
    }
}
