//! `index`: report on the state of the chunk/symbol index and the
//! embedding pipeline backlog.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{invalid_action, parse_args, Context, ToolError};

const TOOL: &str = "index";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["status", "stats"]}
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    #[serde(default)]
    action: Option<String>,
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let args: Args = parse_args(arguments)?;
    let action = args.action.clone().unwrap_or_else(|| "status".to_string());

    match action.as_str() {
        "status" => status(ctx),
        "stats" => stats(ctx).await,
        other => Err(invalid_action(TOOL, other)),
    }
}

fn status(ctx: &Context) -> Result<Value, ToolError> {
    let summary = ctx.storage.index_summary()?;
    Ok(json!({
        "dbPath": ctx.storage.db_path(),
        "rooms": ctx.rooms.all().len(),
        "summary": summary
    }))
}

async fn stats(ctx: &Context) -> Result<Value, ToolError> {
    let summary = ctx.storage.index_summary()?;
    let pipeline = match &ctx.pipeline {
        Some(pipeline) => Some(pipeline.stats(&ctx.config.embedder_model).await?),
        None => None,
    };
    Ok(json!({"summary": summary, "pipeline": pipeline}))
}
