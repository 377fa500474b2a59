// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Hippo memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Hippo configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HippoConfig {
    /// Process identity and logging settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Memory engine settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// LLM provider used for summarization and chunking.
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the assistant.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "hippo".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Memory engine configuration.
///
/// Thresholds are cosine similarities in `[0, 1]` and must satisfy
/// `min_similarity <= merge_threshold < identical_threshold`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Maximum number of user sessions held in process.
    #[serde(default = "default_max_users")]
    pub max_users: usize,

    /// Short-term memory capacity (entries per user).
    #[serde(default = "default_stm_capacity")]
    pub stm_capacity: usize,

    /// Long-term memory capacity (chunks per user).
    #[serde(default = "default_ltm_capacity")]
    pub ltm_capacity: usize,

    /// Cosine similarity at or above which two chunks are related and merged.
    #[serde(default = "default_merge_threshold")]
    pub merge_threshold: f32,

    /// Cosine similarity at or above which two chunks are the same fact.
    #[serde(default = "default_identical_threshold")]
    pub identical_threshold: f32,

    /// Minimum cosine similarity for a long-term chunk to be retrieved.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,

    /// Number of long-term chunks retrieved per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Dimension every embedding vector must have.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Half-life of the recency term in the eviction score, in seconds.
    #[serde(default = "default_decay_half_life_secs")]
    pub decay_half_life_secs: u64,

    /// Weight of `usage_count` in the eviction score.
    #[serde(default = "default_usage_weight")]
    pub usage_weight: f64,

    /// Weight of the recency decay in the eviction score.
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    /// Seconds of inactivity after which a user session is dropped.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Upper bound on a single summarization delegate call.
    #[serde(default = "default_summarize_timeout_secs")]
    pub summarize_timeout_secs: u64,

    /// Maximum length of the context string handed to the caller.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Number of (question, response) pairs whose chunking is cached.
    #[serde(default = "default_chunk_cache_capacity")]
    pub chunk_cache_capacity: usize,

    /// Number of knowledge-base snippets requested per query.
    #[serde(default = "default_knowledge_top_k")]
    pub knowledge_top_k: usize,

    /// Name of the embedding model to use.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Directory for downloaded model files. Defaults to the XDG data dir.
    #[serde(default)]
    pub data_dir: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_users: default_max_users(),
            stm_capacity: default_stm_capacity(),
            ltm_capacity: default_ltm_capacity(),
            merge_threshold: default_merge_threshold(),
            identical_threshold: default_identical_threshold(),
            min_similarity: default_min_similarity(),
            top_k: default_top_k(),
            embedding_dim: default_embedding_dim(),
            decay_half_life_secs: default_decay_half_life_secs(),
            usage_weight: default_usage_weight(),
            recency_weight: default_recency_weight(),
            idle_timeout_secs: default_idle_timeout_secs(),
            summarize_timeout_secs: default_summarize_timeout_secs(),
            max_context_chars: default_max_context_chars(),
            chunk_cache_capacity: default_chunk_cache_capacity(),
            knowledge_top_k: default_knowledge_top_k(),
            model_name: default_model_name(),
            data_dir: None,
        }
    }
}

impl MemoryConfig {
    /// Resolve the data directory, falling back to `$XDG_DATA_HOME/hippo`.
    pub fn resolved_data_dir(&self) -> std::path::PathBuf {
        match &self.data_dir {
            Some(dir) => std::path::PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|p| p.join("hippo"))
                .unwrap_or_else(|| std::path::PathBuf::from(".hippo")),
        }
    }
}

fn default_max_users() -> usize {
    1000
}

fn default_stm_capacity() -> usize {
    5
}

fn default_ltm_capacity() -> usize {
    60 // ~20 rounds at ~3 chunks per round
}

fn default_merge_threshold() -> f32 {
    0.75
}

fn default_identical_threshold() -> f32 {
    0.92
}

fn default_min_similarity() -> f32 {
    0.30
}

fn default_top_k() -> usize {
    3
}

fn default_embedding_dim() -> usize {
    384
}

fn default_decay_half_life_secs() -> u64 {
    300 // 5 minutes
}

fn default_usage_weight() -> f64 {
    1.0
}

fn default_recency_weight() -> f64 {
    1.0
}

fn default_idle_timeout_secs() -> u64 {
    3600
}

fn default_summarize_timeout_secs() -> u64 {
    20
}

fn default_max_context_chars() -> usize {
    2000
}

fn default_chunk_cache_capacity() -> usize {
    256
}

fn default_knowledge_top_k() -> usize {
    3
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

/// OpenAI-compatible provider configuration (Ollama, vLLM, OpenAI).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for answers, summaries and chunking.
    #[serde(default = "default_provider_model")]
    pub model: String,

    /// API key. `None` sends no Authorization header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Maximum tokens for a context summary.
    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_provider_model(),
            api_key: None,
            summary_max_tokens: default_summary_max_tokens(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_provider_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_summary_max_tokens() -> u32 {
    512
}
