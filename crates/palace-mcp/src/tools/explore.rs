//! `explore`: code-oriented read surface — lexical search, rooms, file
//! contents, and call/import graph queries.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{invalid_action, missing_arg, parse_args, Context, ToolError};

const TOOL: &str = "explore";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": [
                "search", "rooms", "context", "impact", "symbols", "symbol",
                "file", "deps", "callers", "callees", "graph"
            ]},
            "query": {"type": "string"},
            "path": {"type": "string"},
            "name": {"type": "string"},
            "file": {"type": "string"},
            "files": {"type": "array", "items": {"type": "string"}},
            "roomFilter": {"type": "string"},
            "limit": {"type": "integer"},
            "fuzzy": {"type": "boolean"}
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    #[serde(default)]
    action: Option<String>,
    query: Option<String>,
    path: Option<String>,
    name: Option<String>,
    file: Option<String>,
    files: Option<Vec<String>>,
    room_filter: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    fuzzy: bool,
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let args: Args = parse_args(arguments)?;
    let action = args.action.clone().unwrap_or_else(|| "search".to_string());

    match action.as_str() {
        "search" => search(ctx, &args),
        "rooms" => Ok(json!({"rooms": ctx.rooms.all()})),
        "context" => context(ctx, &args),
        "impact" => impact(ctx, &args),
        "symbols" => symbols(ctx, &args),
        "symbol" => symbol(ctx, &args),
        "file" => file(ctx, &args),
        "deps" => deps(ctx, &args),
        "callers" => callers(ctx, &args),
        "callees" => callees(ctx, &args),
        "graph" => graph(ctx, &args),
        other => Err(invalid_action(TOOL, other)),
    }
}

fn search(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let query = args.query.as_deref().ok_or_else(|| missing_arg(TOOL, "query"))?;
    let limit = match args.limit {
        Some(0) | None => 20,
        Some(n) => n,
    };
    let hits = palace_core::retrieval::lexical_search(&ctx.storage, &ctx.rooms, query, limit, args.fuzzy)?;
    let attributed = palace_core::retrieval::attribute_rooms(hits, &ctx.rooms, "_ungrouped");
    let filtered: Vec<_> = match &args.room_filter {
        Some(room) => attributed.into_iter().filter(|h| &h.room == room).collect(),
        None => attributed,
    };
    let grouped = palace_core::retrieval::group_by_room(filtered);
    Ok(json!({"rooms": grouped}))
}

fn context(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let path = args.path.as_deref();
    let mut records = ctx.storage.authoritative_state(&ctx.rooms, path, 10, 10, 2000)?;
    records.extend(ctx.corridor_records()?);
    let room = path.and_then(|p| ctx.rooms.room_for_path(p));
    Ok(json!({"room": room, "records": records}))
}

fn impact(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let target = args.name.as_deref().or(args.path.as_deref()).ok_or_else(|| missing_arg(TOOL, "name"))?;
    let impact = ctx.storage.impact(target)?;
    Ok(serde_json::to_value(impact)?)
}

fn symbols(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let name = args.name.as_deref().ok_or_else(|| missing_arg(TOOL, "name"))?;
    let matches = ctx.storage.symbols_by_name(name)?;
    Ok(json!({"symbols": matches}))
}

fn symbol(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let name = args.name.as_deref().ok_or_else(|| missing_arg(TOOL, "name"))?;
    let matches = ctx.storage.symbols_by_name(name)?;
    let incoming = ctx.storage.incoming_calls(name)?;
    let outgoing = ctx.storage.outgoing_calls(name, args.file.as_deref())?;
    Ok(json!({"symbol": matches, "incoming": incoming, "outgoing": outgoing}))
}

fn file(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let path = args.path.as_deref().ok_or_else(|| missing_arg(TOOL, "path"))?;
    let content = ctx.storage.read_file(path)?;
    let chunks = ctx.storage.chunks_for_path(path)?;
    Ok(json!({"path": path, "content": content, "chunks": chunks}))
}

fn deps(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let roots = match (&args.files, &args.file) {
        (Some(files), _) => files.clone(),
        (None, Some(file)) => vec![file.clone()],
        (None, None) => return Err(missing_arg(TOOL, "files")),
    };
    let graph = ctx.storage.dependency_graph(&roots)?;
    Ok(json!({"files": graph}))
}

fn callers(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let name = args.name.as_deref().ok_or_else(|| missing_arg(TOOL, "name"))?;
    Ok(json!({"callers": ctx.storage.incoming_calls(name)?}))
}

fn callees(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let name = args.name.as_deref().ok_or_else(|| missing_arg(TOOL, "name"))?;
    Ok(json!({"callees": ctx.storage.outgoing_calls(name, args.file.as_deref())?}))
}

fn graph(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let file = args.file.as_deref().ok_or_else(|| missing_arg(TOOL, "file"))?;
    Ok(serde_json::to_value(ctx.storage.call_graph(file)?)?)
}
