//! Palace MCP server.
//!
//! Indexes a workspace and exposes it to AI agents over JSON-RPC on
//! stdio: hybrid retrieval, a knowledge store with a proposal/approval
//! lifecycle, a deterministic route planner, and session/conflict
//! tracking across concurrently-working agents.

mod context;
mod protocol;
mod server;
mod tools;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use palace_core::embeddings::{HttpEmbedder, Pipeline};
use palace_core::llm::HttpLlmClient;
use palace_core::{Config, RoomCache, Storage};

use crate::context::Context;
use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;

struct Args {
    root: PathBuf,
    admin: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut admin = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("palace-mcp {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("USAGE:");
                println!("    palace-mcp [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help         Print help information");
                println!("    -V, --version       Print version information");
                println!("    --root <PATH>       Workspace root to index (default: current directory)");
                println!("    --admin             Enable admin-gated tools/actions");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                      Log level filter (default: info)");
                println!("    PALACE_EMBEDDER_URL/API_KEY/MODEL");
                println!("    PALACE_LLM_URL/API_KEY/MODEL");
                println!("    PALACE_PIPELINE_WORKERS/QUEUE_CAPACITY");
                println!("    PALACE_DECAY_STALE_DAYS/LAMBDA_PER_DAY");
                println!("    PALACE_CONFLICT_WINDOW_SECS");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("palace-mcp {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--root" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --root requires a path argument");
                    std::process::exit(2);
                }
                root = PathBuf::from(&args[i]);
            }
            "--admin" => admin = true,
            arg => {
                eprintln!("error: unknown argument '{arg}'");
                eprintln!("Try 'palace-mcp --help' for more information.");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    Args { root, admin }
}

/// The corridor is a cross-workspace personal store: a second database
/// outside any one workspace, under the user's data directory.
fn corridor_db_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "palace")
        .map(|dirs| dirs.data_dir().join("corridor.db"))
        .unwrap_or_else(|| PathBuf::from(".palace-corridor.db"))
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), root = %args.root.display(), admin = args.admin, "palace-mcp starting");

    let config = Config::from_env(args.root.clone(), args.admin);

    let storage = match Storage::new(config.db_path()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to open workspace storage");
            std::process::exit(1);
        }
    };

    let corridor_path = corridor_db_path();
    if let Some(parent) = corridor_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let corridor = match Storage::new(&corridor_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, path = %corridor_path.display(), "failed to open corridor storage");
            std::process::exit(1);
        }
    };

    let rooms = Arc::new(RoomCache::load(&config.rooms_dir()));
    info!(rooms = rooms.all().len(), "loaded room manifests");

    let embedder = config
        .embedder_url
        .clone()
        .map(|url| Arc::new(HttpEmbedder::new(url, config.embedder_api_key.clone())) as Arc<dyn palace_core::embeddings::Embedder>);
    if embedder.is_none() {
        warn!("no embedder configured; semantic search and embedding backfill are unavailable");
    }

    let llm = config
        .llm_url
        .clone()
        .map(|url| Arc::new(HttpLlmClient::new(url, config.llm_api_key.clone())) as Arc<dyn palace_core::llm::LlmClient>);

    let pipeline = embedder
        .clone()
        .map(|embedder| Pipeline::new(Arc::clone(&storage), embedder, config.pipeline_workers, config.pipeline_queue_capacity));

    // Periodically backfill missing embeddings and apply confidence decay,
    // so both stay current without an explicit `index`/`decay` call.
    if let Some(pipeline) = pipeline.clone() {
        let storage = Arc::clone(&storage);
        let model_id = config.embedder_model.clone();
        let stale_after = chrono::Duration::from_std(config.decay_stale_after).unwrap_or(chrono::Duration::days(30));
        let lambda = config.decay_lambda_per_day;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                match pipeline.sync(&model_id, None, 200).await {
                    Ok(n) if n > 0 => info!(enqueued = n, "embedding backfill sweep"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "embedding backfill sweep failed"),
                }
                match storage.decay_apply(chrono::Utc::now(), stale_after, lambda) {
                    Ok(entries) if !entries.is_empty() => info!(decayed = entries.len(), "confidence decay sweep"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "confidence decay sweep failed"),
                }
            }
        });
    }

    let ctx = Context { storage, corridor, rooms, embedder, llm, pipeline, config };
    let server = McpServer::new(ctx);
    let transport = StdioTransport::new();

    info!("starting MCP server on stdio");
    if let Err(e) = transport.run(server).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }

    info!("palace-mcp shutting down");
}
