//! Shared configuration shape, loaded by every binary.
//!
//! Each binary builds its `clap::Parser` struct around these fields
//! (`#[arg(long, env = "CHATMESH_...")]`), overlaid on a `SharedConfig`
//! parsed from an optional TOML file. See `chatmesh_service::config` for
//! the per-binary `clap::Parser` wiring.

use serde::{Deserialize, Serialize};

/// Recognized configuration options from the external-interfaces spec:
/// worker parallelism, collaborator timeouts and endpoints, bus topology,
/// and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Worker parallelism per Generator/Writer instance.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Hard timeout, in seconds, for the personalization memory fetch.
    #[serde(default = "default_memory_api_timeout")]
    pub memory_api_timeout_secs: f64,

    /// Per-turn cap on tool-call round-trips (loop guard).
    #[serde(default = "default_max_tool_calls_per_turn")]
    pub max_tool_calls_per_turn: u32,

    /// Cap applied to any client-supplied vector-search `limit`.
    #[serde(default = "default_max_search_limit")]
    pub max_search_limit: u32,

    /// TTL, in seconds, for a conversation in the hot cache.
    #[serde(default = "default_hot_cache_ttl_secs")]
    pub hot_cache_ttl_secs: u64,

    /// TTL, in seconds, for the Egress replay buffer.
    #[serde(default = "default_replay_buffer_ttl_secs")]
    pub replay_buffer_ttl_secs: u64,

    /// Idle-close ceiling, in seconds, for an open SSE stream.
    #[serde(default = "default_sse_idle_timeout_secs")]
    pub sse_idle_timeout_secs: u64,

    /// LLM provider chat-completions endpoint.
    #[serde(default)]
    pub llm_endpoint: Option<String>,

    /// LLM provider embeddings endpoint (may be the same host as
    /// `llm_endpoint`, or absent if a local embedder is used).
    #[serde(default)]
    pub embeddings_endpoint: Option<String>,

    /// Model identifier used for chat completions.
    #[serde(default = "default_model")]
    pub model: String,

    /// Hot cache host:port.
    #[serde(default)]
    pub cache_addr: Option<String>,

    /// Bus namespace (logical grouping of topics/subscriptions).
    #[serde(default = "default_bus_namespace")]
    pub bus_namespace: String,

    /// Document store endpoint/path.
    #[serde(default)]
    pub document_store_path: Option<String>,

    /// Log level, parsed by `tracing_subscriber::EnvFilter`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_max_concurrency() -> usize {
    8
}

fn default_memory_api_timeout() -> f64 {
    2.0
}

fn default_max_tool_calls_per_turn() -> u32 {
    3
}

fn default_max_search_limit() -> u32 {
    50
}

fn default_hot_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_replay_buffer_ttl_secs() -> u64 {
    30
}

fn default_sse_idle_timeout_secs() -> u64 {
    5 * 60
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_bus_namespace() -> String {
    "chatmesh".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            memory_api_timeout_secs: default_memory_api_timeout(),
            max_tool_calls_per_turn: default_max_tool_calls_per_turn(),
            max_search_limit: default_max_search_limit(),
            hot_cache_ttl_secs: default_hot_cache_ttl_secs(),
            replay_buffer_ttl_secs: default_replay_buffer_ttl_secs(),
            sse_idle_timeout_secs: default_sse_idle_timeout_secs(),
            llm_endpoint: None,
            embeddings_endpoint: None,
            model: default_model(),
            cache_addr: None,
            bus_namespace: default_bus_namespace(),
            document_store_path: None,
            log_level: default_log_level(),
        }
    }
}

/// Bus topic names, fixed by the architecture (not user-configurable,
/// unlike `bus_namespace`).
pub mod topics {
    pub const USER_MESSAGES: &str = "user-messages";
    pub const TOKEN_STREAMS: &str = "token-streams";
    pub const MESSAGE_COMPLETED: &str = "message-completed";
}

/// Subscription names within `message-completed`, one per writer fleet.
pub mod subscriptions {
    pub const HISTORY_WRITER: &str = "history-writer";
    pub const MEMORY_WRITER: &str = "memory-writer";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = SharedConfig::default();
        assert_eq!(cfg.memory_api_timeout_secs, 2.0);
        assert_eq!(cfg.max_tool_calls_per_turn, 3);
        assert_eq!(cfg.hot_cache_ttl_secs, 24 * 60 * 60);
    }

    #[test]
    fn deserializes_from_partial_toml_with_defaults() {
        let toml_str = "max_concurrency = 16\n";
        let cfg: SharedConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.max_concurrency, 16);
        assert_eq!(cfg.memory_api_timeout_secs, 2.0);
    }

    #[test]
    fn serde_roundtrip_preserves_values() {
        let mut cfg = SharedConfig::default();
        cfg.max_concurrency = 32;
        cfg.llm_endpoint = Some("https://api.example.com".to_string());
        let json = serde_json::to_string(&cfg).unwrap();
        let parsed: SharedConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.max_concurrency, 32);
        assert_eq!(parsed.llm_endpoint.as_deref(), Some("https://api.example.com"));
    }
}
