//! `route`: deterministic route planning from a natural-language intent
//! to an ordered list of rooms, decisions, learnings, and files to read.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{missing_arg, parse_args, Context, ToolError};
use palace_core::route::{plan_route, RouteConfig};

const TOOL: &str = "route";

pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "intent": {"type": "string"},
            "scope": {"type": "string", "enum": ["palace", "room", "file"]},
            "scopePath": {"type": "string"},
            "maxNodes": {"type": "integer"},
            "minLearningConfidence": {"type": "number"}
        },
        "required": ["intent"]
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Args {
    intent: Option<String>,
    scope: Option<String>,
    scope_path: Option<String>,
    max_nodes: Option<usize>,
    min_learning_confidence: Option<f64>,
}

pub async fn execute(ctx: &Context, arguments: Option<Value>) -> Result<Value, ToolError> {
    let args: Args = parse_args(arguments)?;
    let intent = args.intent.as_deref().ok_or_else(|| missing_arg(TOOL, "intent"))?;
    let scope = args.scope.as_deref().unwrap_or("palace");

    let defaults = RouteConfig::default();
    let config = RouteConfig {
        max_nodes: args.max_nodes.unwrap_or(defaults.max_nodes),
        min_learning_confidence: args.min_learning_confidence.unwrap_or(defaults.min_learning_confidence),
    };

    let route = plan_route(&ctx.rooms, Some(&ctx.storage), intent, scope, args.scope_path.as_deref(), &config)?;
    Ok(serde_json::to_value(route)?)
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
    async fn empty_workspace_yields_an_empty_route() {
        let (ctx, _dir) = test_ctx();
        let result = execute(&ctx, Some(json!({"intent": "how does the ingest pipeline work"}))).await.unwrap();
        assert!(result["nodes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_intent_is_an_error() {
        let (ctx, _dir) = test_ctx();
        let err = execute(&ctx, Some(json!({}))).await.unwrap_err();
        assert!(matches!(err, ToolError::Engine(palace_core::EngineError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn node_count_meta_matches_the_node_list() {
        let (ctx, _dir) = test_ctx();
        let result = execute(&ctx, Some(json!({"intent": "something", "maxNodes": 3}))).await.unwrap();
        assert_eq!(result["meta"]["nodeCount"], result["nodes"].as_array().unwrap().len() as u64);
    }
}
