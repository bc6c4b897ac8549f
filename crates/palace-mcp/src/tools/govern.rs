//! `govern`: the proposal queue — list records awaiting approval, and
//! approve or reject them. Admin-only.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{invalid_action, missing_arg, parse_args, Context, ToolError};
use palace_core::embeddings::Job;

const TOOL: &str = "govern";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["approve", "reject", "list"]},
            "id": {"type": "string"}
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    #[serde(default)]
    action: Option<String>,
    id: Option<String>,
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    ctx.require_admin(TOOL)?;
    let args: Args = parse_args(arguments)?;
    let action = args.action.clone().unwrap_or_else(|| "list".to_string());

    match action.as_str() {
        "approve" => approve(ctx, &args).await,
        "reject" => reject(ctx, &args),
        "list" => list(ctx),
        other => Err(invalid_action(TOOL, other)),
    }
}

async fn approve(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    let record = ctx.storage.approve_proposal(id)?;

    // The proposal is only embeddable now that it's approved content.
    if let Some(pipeline) = &ctx.pipeline {
        pipeline
            .enqueue(Job { reference: record.id.clone(), text: record.content.clone(), model_id: ctx.config.embedder_model.clone() })
            .await;
    }

    Ok(json!({"approved": id}))
}

fn reject(ctx: &Context, args: &Args) -> Result<Value, ToolError> {
    let id = args.id.as_deref().ok_or_else(|| missing_arg(TOOL, "id"))?;
    ctx.storage.reject_proposal(id)?;
    Ok(json!({"rejected": id}))
}

fn list(ctx: &Context) -> Result<Value, ToolError> {
    let proposals = ctx.storage.list_proposals()?;
    Ok(json!({"proposals": proposals}))
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
    async fn non_admin_is_rejected() {
        let (ctx, _dir) = test_ctx(false);
        let err = execute(&ctx, Some(json!({"action": "list"}))).await.unwrap_err();
        assert!(matches!(err, ToolError::Engine(palace_core::EngineError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn admin_approves_a_proposal() {
        let (ctx, _dir) = test_ctx(true);
        let record = ctx
            .storage
            .add_record(RecordInput { content: "proposed idea".into(), ..Default::default() }, false)
            .unwrap();
        let proposals = ctx.storage.list_proposals().unwrap();
        let proposal_id = proposals.iter().find(|(_, r)| r.id == record.id).unwrap().0.clone();

        let result = execute(&ctx, Some(json!({"action": "approve", "id": proposal_id}))).await.unwrap();
        assert_eq!(result["approved"], proposal_id);
        assert_eq!(ctx.storage.get_record(&record.id).unwrap().authority, palace_core::Authority::Approved);
    }

    #[tokio::test]
    async fn approve_without_id_is_an_error() {
        let (ctx, _dir) = test_ctx(true);
        let err = execute(&ctx, Some(json!({"action": "approve"}))).await.unwrap_err();
        assert!(matches!(err, ToolError::Engine(palace_core::EngineError::InvalidArgument(_))));
    }
}
