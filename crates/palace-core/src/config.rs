//! Engine configuration.
//!
//! Assembled by the binary from CLI flags plus environment-variable
//! fallbacks for knobs that have no command-line surface (the spec
//! scopes CLI flag parsing itself out as external).

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for the engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace root; `.palace/` is created under this directory.
    pub root: PathBuf,
    /// Whether admin-gated tools/actions are permitted.
    pub admin: bool,
    /// Embedder HTTP endpoint.
    pub embedder_url: Option<String>,
    pub embedder_api_key: Option<String>,
    pub embedder_model: String,
    /// LLM HTTP endpoint used for contradiction judging and briefing.
    pub llm_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    /// Embedding pipeline worker count and queue capacity.
    pub pipeline_workers: usize,
    pub pipeline_queue_capacity: usize,
    /// Decay half-life parameters.
    pub decay_stale_after: Duration,
    pub decay_lambda_per_day: f64,
    /// Session conflict-detection window.
    pub conflict_window: Duration,
}

impl Config {
    /// Build a configuration from the two CLI flags plus environment fallbacks.
    pub fn from_env(root: PathBuf, admin: bool) -> Self {
        Self {
            root,
            admin,
            embedder_url: std::env::var("PALACE_EMBEDDER_URL").ok(),
            embedder_api_key: std::env::var("PALACE_EMBEDDER_API_KEY").ok(),
            embedder_model: std::env::var("PALACE_EMBEDDER_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            llm_url: std::env::var("PALACE_LLM_URL").ok(),
            llm_api_key: std::env::var("PALACE_LLM_API_KEY").ok(),
            llm_model: std::env::var("PALACE_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            pipeline_workers: std::env::var("PALACE_PIPELINE_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
            pipeline_queue_capacity: std::env::var("PALACE_PIPELINE_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
            decay_stale_after: Duration::from_secs(
                std::env::var("PALACE_DECAY_STALE_DAYS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(30)
                    * 86_400,
            ),
            decay_lambda_per_day: std::env::var("PALACE_DECAY_LAMBDA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.01),
            conflict_window: Duration::from_secs(
                std::env::var("PALACE_CONFLICT_WINDOW_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(".palace").join("index.db")
    }

    pub fn rooms_dir(&self) -> PathBuf {
        self.root.join(".palace").join("rooms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_path_lives_under_dot_palace() {
        let config = Config::from_env(PathBuf::from("/workspace"), false);
        assert_eq!(config.db_path(), PathBuf::from("/workspace/.palace/index.db"));
        assert_eq!(config.rooms_dir(), PathBuf::from("/workspace/.palace/rooms"));
    }
}
