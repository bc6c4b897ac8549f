//! `recall`: read and manage knowledge records — fetch, link graph,
//! outcome feedback, and the obsolete/archive lifecycle.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{invalid_action, missing_arg, parse_args, Context, ToolError};
use palace_core::llm::judge_contradiction;
use palace_core::retrieval::{find_similar, lexical_search_records};
use palace_core::{Authority, LinkDirection, Outcome, RecordFilter, RecordKind};

const TOOL: &str = "recall";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["get", "links", "link", "unlink", "outcome", "obsolete", "archive", "contradictions"]},
            "id": {"type": "string"},
            "query": {"type": "string"},
            "kind": {"type": "string"},
            "authority": {"type": "string"},
            "scopePath": {"type": "string"},
            "limit": {"type": "integer"},
            "targetId": {"type": "string"},
            "relation": {"type": "string"},
            "linkId": {"type": "string"},
            "direction": {"type": "string", "enum": ["outgoing", "incoming", "both"]},
            "outcome": {"type": "string", "enum": ["success", "failed", "mixed"]},
            "note": {"type": "string"},
            "reason": {"type": "string"},
            "unusedDays": {"type": "integer"},
            "maxConfidence": {"type": "number"},
            "candidateLimit": {"type": "integer"},
            "minSimilarity": {"type": "number"},
            "minConfidence": {"type": "number"}
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    #[serde(default)]
    action: Option<String>,
    id: Option<String>,
    query: Option<String>,
    kind: Option<String>,
    authority: Option<String>,
    scope_path: Option<String>,
    limit: Option<i64>,
    target_id: Option<String>,
    relation: Option<String>,
    link_id: Option<String>,
    direction: Option<String>,
    outcome: Option<String>,
    note: Option<String>,
    reason: Option<String>,
    unused_days: Option<i64>,
    max_confidence: Option<f64>,
    candidate_limit: Option<usize>,
    min_similarity: Option<f32>,
    min_confidence: Option<f64>,
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let args: Args = parse_args(arguments)?;
    let action = args.action.clone().unwrap_or_else(|| "get".to_string());

    match action.as_str() {
        "get" => get(ctx, &args),
        "links" => links(ctx, &args),
        "link" => link(ctx, &args),
        "unlink" => unlink(ctx, &args),
        "outcome" => outcome(ctx, &args),
        "obsolete" => obsolete(ctx, &args),
        "archive" => archive(ctx, &args),
        "contradictions" => contradictions(ctx, &args).await,
        other => Err(invalid_action(TOOL, other)),
    }
}

fn get(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    if let Some(id) = &args.id {
        return Ok(serde_json::to_value(ctx.storage.get_record(id)?)?);
    }

    let kind = args.kind.as_deref().and_then(RecordKind::parse);
    let limit = args.limit.unwrap_or(20);
    let authority = args.authority.as_deref().and_then(Authority::parse);

    let records = match &args.query {
        // Rank by the `records_fts` BM25 index rather than a Rust-side
        // substring scan, and apply the other filters against that
        // ranked set so a match outside the first page isn't dropped
        // before the query is even considered.
        Some(query) if !query.trim().is_empty() => {
            let hits = lexical_search_records(&ctx.storage, query, (limit.max(1) as usize) * 5, false)?;
            let filter = RecordFilter { authority, scope_path: args.scope_path.clone(), ..Default::default() };
            let candidates = ctx.storage.list_records(kind, filter)?;
            let by_id: std::collections::HashMap<&str, &palace_core::Record> =
                candidates.iter().map(|r| (r.id.as_str(), r)).collect();
            hits.into_iter()
                .filter_map(|hit| by_id.get(hit.id.as_str()).map(|r| (*r).clone()))
                .take(limit as usize)
                .collect()
        }
        _ => {
            let filter = RecordFilter { authority, scope_path: args.scope_path.clone(), limit: Some(limit), ..Default::default() };
            ctx.storage.list_records(kind, filter)?
        }
    };

    Ok(json!({"records": records}))
}

fn links(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let direction = match args.direction.as_deref() {
        Some("outgoing") => LinkDirection::Outgoing,
        Some("incoming") => LinkDirection::Incoming,
        _ => LinkDirection::Both,
    };
    Ok(json!({"links": ctx.storage.links(id, direction)?}))
}

fn link(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    ctx.require_admin("recall link")?;
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let target = args.target_id.as_deref().ok_or_else(|| missing_arg(TOOL, "targetId"))?;
    let relation = args.relation.as_deref().unwrap_or("related");
    Ok(serde_json::to_value(ctx.storage.link(id, target, relation)?)?)
}

fn unlink(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    ctx.require_admin("recall unlink")?;
    let link_id = args.link_id.as_deref().ok_or_else(|| missing_arg(TOOL, "linkId"))?;
    ctx.storage.unlink(link_id)?;
    Ok(json!({"unlinked": link_id}))
}

fn outcome(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    ctx.require_admin("recall outcome")?;
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let outcome = args
        .outcome
        .as_deref()
        .and_then(Outcome::parse)
        .ok_or_else(|| missing_arg(TOOL, "outcome"))?;
    Ok(serde_json::to_value(ctx.storage.record_outcome(id, outcome, args.note.as_deref())?)?)
}

fn obsolete(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    ctx.require_admin("recall obsolete")?;
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let reason = args.reason.as_deref().unwrap_or("");
    Ok(serde_json::to_value(ctx.storage.mark_obsolete(id, reason)?)?)
}

fn archive(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    ctx.require_admin("recall archive")?;
    let unused_days = args.unused_days.unwrap_or(90);
    let max_confidence = args.max_confidence.unwrap_or(0.3);
    Ok(json!({"archived": ctx.storage.archive(unused_days, max_confidence)?}))
}

/// Find records semantically close to `id` and ask the LLM whether each
/// one actually contradicts it, auto-linking confirmed pairs so the
/// conflict surfaces the next time either record is recalled.
async fn contradictions(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let source = ctx.storage.get_record(id)?;
    let llm = ctx.require_llm()?;

    let candidates = find_similar(
        &ctx.storage,
        &ctx.config.embedder_model,
        id,
        args.candidate_limit.unwrap_or(10),
        args.min_similarity.unwrap_or(0.6),
    )
    .await?;

    let min_confidence = args.min_confidence.unwrap_or(0.7);
    let mut checked = Vec::new();
    let mut linked = Vec::new();

    for candidate in candidates {
        let Ok(other) = ctx.storage.get_record(&candidate.reference) else { continue };
        let verdict =
            judge_contradiction(llm.as_ref(), &ctx.config.llm_model, &source.content, &other.content).await?;

        if verdict.contradicts && verdict.confidence >= min_confidence {
            ctx.storage.link(id, &other.id, "contradicts")?;
            linked.push(other.id.clone());
        }
        checked.push(json!({
            "id": other.id,
            "similarity": candidate.similarity,
            "contradicts": verdict.contradicts,
            "confidence": verdict.confidence,
        }));
    }

    Ok(json!({"checked": checked, "linked": linked}))
}
