//! Embedding provider configuration.
//!
//! Environment overrides (all optional):
//! - `MNEMO_EMBED_PROVIDER`: `local` | `openai` | `huggingface`
//! - `MNEMO_EMBED_MODEL`: provider model identifier
//! - `MNEMO_EMBED_API_KEY`: bearer token for HTTP providers

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HuggingFaceConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
}

/// Which backend to construct, with its settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum EmbeddingConfig {
    /// Deterministic offline embedder; the default for tests and air-gapped
    /// projects.
    Local { dimensions: usize },
    OpenAI(OpenAIConfig),
    HuggingFace(HuggingFaceConfig),
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::Local {
            dimensions: mnemo_db::DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the configuration, letting environment variables override.
    pub fn from_env() -> Self {
        let provider = std::env::var("MNEMO_EMBED_PROVIDER").unwrap_or_default();
        let model = std::env::var("MNEMO_EMBED_MODEL").ok();
        let api_key = std::env::var("MNEMO_EMBED_API_KEY").unwrap_or_default();
        match provider.as_str() {
            "openai" => EmbeddingConfig::OpenAI(OpenAIConfig {
                api_key,
                model: model.unwrap_or_else(|| "text-embedding-3-small".to_string()),
                dimensions: 1536,
            }),
            "huggingface" => EmbeddingConfig::HuggingFace(HuggingFaceConfig {
                api_key,
                model: model
                    .unwrap_or_else(|| "sentence-transformers/all-MiniLM-L6-v2".to_string()),
                dimensions: 384,
            }),
            _ => EmbeddingConfig::default(),
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            EmbeddingConfig::Local { dimensions } => *dimensions,
            EmbeddingConfig::OpenAI(c) => c.dimensions,
            EmbeddingConfig::HuggingFace(c) => c.dimensions,
        }
    }
}
