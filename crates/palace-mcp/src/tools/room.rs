//! `room`: browse and author room manifests. `create`/`update`/`delete`
//! write `<rooms_dir>/<name>.jsonc` directly, since the manifest cache
//! is read-only at the `RoomCache` layer, then reload the cache.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::context::{invalid_action, missing_arg, parse_args, Context, ToolError};
use palace_core::EngineError;

const TOOL: &str = "room";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["list", "show", "create", "update", "delete"]},
            "name": {"type": "string"},
            "summary": {"type": "string"},
            "entryPoints": {"type": "array", "items": {"type": "string"}},
            "capabilities": {"type": "array", "items": {"type": "string"}},
            "artifacts": {"type": "array"},
            "steps": {"type": "array"}
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    #[serde(default)]
    action: Option<String>,
    name: Option<String>,
    summary: Option<String>,
    entry_points: Option<Vec<String>>,
    capabilities: Option<Vec<String>>,
    artifacts: Option<Vec<ArtifactInput>>,
    steps: Option<Vec<StepInput>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactInput {
    name: String,
    #[serde(default)]
    path_hint: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepInput {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    evidence: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFile<'a> {
    schema_version: &'a str,
    kind: &'a str,
    name: &'a str,
    summary: &'a str,
    entry_points: &'a [String],
    capabilities: &'a [String],
    artifacts: &'a [ArtifactInput],
    steps: &'a [StepInput],
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let args: Args = parse_args(arguments)?;
    let action = args.action.clone().unwrap_or_else(|| "list".to_string());

    match action.as_str() {
        "list" => list(ctx),
        "show" => show(ctx, &args),
        "create" => write_manifest(ctx, &args, false),
        "update" => write_manifest(ctx, &args, true),
        "delete" => delete(ctx, &args),
        other => Err(invalid_action(TOOL, other)),
    }
}

fn list(ctx: &Context) -> Result<Value, ToolError> {
    Ok(json!({"rooms": ctx.rooms.all()}))
}

fn show(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let name = args.name.as_deref().ok_or_else(|| missing_arg(TOOL, "name"))?;
    let room = ctx.rooms.get(name).ok_or_else(|| ToolError::Engine(EngineError::NotFound(format!("room {name}"))))?;
    Ok(serde_json::to_value(room)?)
}

fn manifest_path(ctx: &Context, name: &str) -> std::path::PathBuf {
    ctx.config.rooms_dir().join(format!("{name}.jsonc"))
}

fn write_manifest(ctx: &Context, args: &Args, require_existing: bool) -> Result<Value, ToolError> {
    ctx.require_admin(&format!("room {}", if require_existing { "update" } else { "create" }))?;
    let name = args.name.as_deref().ok_or_else(|| missing_arg(TOOL, "name"))?;
    let path = manifest_path(ctx, name);

    if require_existing && !path.exists() {
        return Err(ToolError::Engine(EngineError::NotFound(format!("room {name}"))));
    }

    let entry_points = args.entry_points.clone().unwrap_or_default();
    let capabilities = args.capabilities.clone().unwrap_or_default();
    let artifacts = args.artifacts.clone().unwrap_or_default();
    let steps = args.steps.clone().unwrap_or_default();
    let summary = args.summary.clone().unwrap_or_default();

    let manifest = ManifestFile {
        schema_version: "1.0.0",
        kind: "palace/room",
        name,
        summary: &summary,
        entry_points: &entry_points,
        capabilities: &capabilities,
        artifacts: &artifacts,
        steps: &steps,
    };

    let rooms_dir = ctx.config.rooms_dir();
    std::fs::create_dir_all(&rooms_dir).map_err(EngineError::Io)?;
    std::fs::write(&path, serde_json::to_string_pretty(&manifest)?).map_err(EngineError::Io)?;
    ctx.rooms.reload(&rooms_dir);

    Ok(serde_json::to_value(ctx.rooms.get(name))?)
}

fn delete(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    ctx.require_admin("room delete")?;
    let name = args.name.as_deref().ok_or_else(|| missing_arg(TOOL, "name"))?;
    let path = manifest_path(ctx, name);
    if !path.exists() {
        return Err(ToolError::Engine(EngineError::NotFound(format!("room {name}"))));
    }
    std::fs::remove_file(&path).map_err(EngineError::Io)?;
    ctx.rooms.reload(&ctx.config.rooms_dir());
    Ok(json!({"deleted": name}))
}
