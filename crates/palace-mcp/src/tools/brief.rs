//! `brief`: a quick orientation summary — workspace-wide, for a single
//! file, or an LLM-authored narrative ("smart") over the same material.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{invalid_action, parse_args, Context, ToolError};

const TOOL: &str = "brief";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["workspace", "file", "smart"]},
            "path": {"type": "string"}
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    #[serde(default)]
    action: Option<String>,
    path: Option<String>,
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let args: Args = parse_args(arguments)?;
    let action = args.action.clone().unwrap_or_else(|| "workspace".to_string());

    match action.as_str() {
        "workspace" => workspace(ctx),
        "file" => file(ctx, &args),
        "smart" => smart(ctx, &args).await,
        other => Err(invalid_action(TOOL, other)),
    }
}

fn workspace(ctx: &Context) -> Result<Value, ToolError> {
    let rooms = ctx.rooms.all();
    let mut records = ctx.storage.authoritative_state(&ctx.rooms, None, 5, 5, 500)?;
    records.extend(ctx.corridor_records()?);
    Ok(json!({"rooms": rooms, "records": records}))
}

fn file(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let path = args.path.as_deref().ok_or_else(|| crate::context::missing_arg(TOOL, "path"))?;
    let room = ctx.rooms.room_for_path(path);
    let mut records = ctx.storage.authoritative_state(&ctx.rooms, Some(path), 5, 5, 1000)?;
    records.extend(ctx.corridor_records()?);
    Ok(json!({"path": path, "room": room, "records": records}))
}

async fn smart(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let base = match &args.path {
        Some(_) => file(ctx, args)?,
        None => workspace(ctx)?,
    };

    let llm = match &ctx.llm {
        Some(llm) => llm,
        None => return Ok(json!({"brief": base, "narrative": null, "degraded": "unavailable"})),
    };

    let prompt = format!(
        "Summarize this workspace briefing for an onboarding coding agent in three sentences:\n\n{base}"
    );
    let narrative = llm.complete(&prompt, &ctx.config.llm_model).await?;
    Ok(json!({"brief": base, "narrative": narrative}))
}
