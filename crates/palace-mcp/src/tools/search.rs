//! `search`: semantic and hybrid retrieval over knowledge records, and
//! similarity-to-record lookups.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{invalid_action, missing_arg, parse_args, Context, ToolError};
use palace_core::retrieval;

const TOOL: &str = "search";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["semantic", "hybrid", "similar"]},
            "query": {"type": "string"},
            "recordId": {"type": "string"},
            "limit": {"type": "integer"},
            "minSimilarity": {"type": "number"}
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    #[serde(default)]
    action: Option<String>,
    query: Option<String>,
    record_id: Option<String>,
    limit: Option<usize>,
    min_similarity: Option<f32>,
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let args: Args = parse_args(arguments)?;
    let action = args.action.clone().unwrap_or_else(|| "hybrid".to_string());

    match action.as_str() {
        "semantic" => semantic(ctx, &args).await,
        "hybrid" => hybrid(ctx, &args).await,
        "similar" => similar(ctx, &args).await,
        other => Err(invalid_action(TOOL, other)),
    }
}

fn limit_of(args: &Args) -> usize {
    match args.limit {
        Some(0) | None => 20,
        Some(n) => n,
    }
}

async fn semantic(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let query = args.query.as_deref().ok_or_else(|| missing_arg(TOOL, "query"))?;
    let embedder = ctx.require_embedder()?;
    let hits = retrieval::semantic_search(
        &ctx.storage,
        embedder.as_ref(),
        &ctx.config.embedder_model,
        query,
        limit_of(args),
        args.min_similarity.unwrap_or(0.5),
        None,
        None,
    )
    .await?;
    Ok(json!({"hits": hits}))
}

async fn hybrid(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let query = args.query.as_deref().ok_or_else(|| missing_arg(TOOL, "query"))?;
    let limit = limit_of(args);

    // Two lexical sources feed the fusion: chunk paths from the code
    // index, and record ids from the knowledge index. Semantic hits are
    // keyed by record id, so without the records side, fusion has
    // nothing to overlap with and every hit degrades to single-source.
    let chunk_hits = retrieval::lexical_search(&ctx.storage, &ctx.rooms, query, limit, false)?;
    let record_hits = retrieval::lexical_search_records(&ctx.storage, query, limit, false)?;
    let lexical: Vec<(String, f64)> = chunk_hits
        .iter()
        .map(|h| (h.path.clone(), h.score))
        .chain(record_hits.iter().map(|h| (h.id.clone(), h.score)))
        .collect();

    let semantic: Vec<(String, f32)> = match &ctx.embedder {
        Some(embedder) => retrieval::semantic_search(
            &ctx.storage,
            embedder.as_ref(),
            &ctx.config.embedder_model,
            query,
            limit,
            args.min_similarity.unwrap_or(0.5),
            None,
            None,
        )
        .await?
        .into_iter()
        .map(|h| (h.reference, h.similarity))
        .collect(),
        None => Vec::new(),
    };

    let mut fused = retrieval::fuse(&lexical, &semantic);
    fused.truncate(limit);
    let degraded = semantic.is_empty() && ctx.embedder.is_none();
    Ok(json!({"hits": fused, "degraded": degraded.then_some("unavailable")}))
}

async fn similar(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let record_id = args.record_id.as_deref().ok_or_else(|| missing_arg(TOOL, "recordId"))?;
    let hits = retrieval::find_similar(
        &ctx.storage,
        &ctx.config.embedder_model,
        record_id,
        limit_of(args),
        args.min_similarity.unwrap_or(0.5),
    )
    .await?;
    Ok(json!({"hits": hits}))
}
