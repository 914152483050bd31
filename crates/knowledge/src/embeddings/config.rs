//! Embedding configuration resolved from the application config.

use kbase_core::config::{default_embedding_model_for, AppConfig};
use serde::{Deserialize, Serialize};

/// Everything needed to load one embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "ollama" or "mock"
    pub provider: String,

    /// Model identifier (provider-specific); stored next to cached vectors
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Whether to normalize embeddings to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Per-call deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Provider endpoint; `None` uses the provider default
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_normalize() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: default_embedding_model_for("mock").to_string(),
            dimensions: 384,
            normalize: default_normalize(),
            timeout_secs: default_timeout_secs(),
            endpoint: None,
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the active embedding provider from the application config.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            provider: config.embedding_provider.clone(),
            model: config.embedding_model(),
            dimensions: config.embedding.dimensions,
            normalize: config.embedding.normalize,
            timeout_secs: config.embedding.timeout_secs,
            endpoint: config.provider_endpoint(&config.embedding_provider),
        }
    }
}
