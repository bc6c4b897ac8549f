//! `store`: create a knowledge record. Kind is inferred from the shape
//! of the input unless `kind` is given explicitly; `direct=true` bypasses
//! the proposal queue and requires admin mode.

use serde_json::Value;

use crate::context::{Context, ToolError};
use palace_core::embeddings::Job;
use palace_core::Authority;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "content": {"type": "string"},
            "kind": {"type": "string", "enum": ["idea", "decision", "learning", "postmortem", "conversation"]},
            "scope": {"type": "string", "enum": ["palace", "room", "file"]},
            "scopePath": {"type": "string"},
            "tags": {"type": "array", "items": {"type": "string"}},
            "direct": {"type": "boolean"},
            "rationale": {"type": "string"},
            "title": {"type": "string"},
            "whatHappened": {"type": "string"},
            "rootCause": {"type": "string"},
            "lessonsLearned": {"type": "array", "items": {"type": "string"}},
            "preventionSteps": {"type": "array", "items": {"type": "string"}},
            "severity": {"type": "string"},
            "affectedFiles": {"type": "array", "items": {"type": "string"}},
            "relatedDecision": {"type": "string"},
            "summary": {"type": "string"},
            "messages": {"type": "array"},
            "sessionId": {"type": "string"}
        },
        "required": ["content"]
    })
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let value = arguments.unwrap_or_else(|| serde_json::json!({}));
    let input: palace_core::RecordInput = serde_json::from_value(value)?;

    // `add_record` itself enforces the `direct=true` admin gate.
    let record = ctx.storage.add_record(input, ctx.admin())?;

    // A direct write lands `approved` immediately; enqueue it for
    // embedding right away rather than waiting on the hourly sync
    // sweep. A proposal is embedded once `govern approve` promotes it.
    if record.authority == Authority::Approved {
        if let Some(pipeline) = &ctx.pipeline {
            pipeline
                .enqueue(Job { reference: record.id.clone(), text: record.content.clone(), model_id: ctx.config.embedder_model.clone() })
                .await;
        }
    }

    Ok(serde_json::to_value(record)?)
}
