//! mnemo-embed — Embedding providers and the embedding cache.
//!
//! The embedding function is an external collaborator specified by contract:
//! a batch of texts in, one vector per text out, with a stable model id. Two
//! HTTP backends (OpenAI, HuggingFace) and a deterministic local hash
//! embedder satisfy the contract; [`CachedEmbedder`] adds the persistent
//! `(model, content_hash)` cache and in-flight coalescing the pipeline
//! depends on.

pub mod cache;
pub mod config;
pub mod error;
pub mod providers;

pub use cache::CachedEmbedder;
pub use config::EmbeddingConfig;
pub use error::EmbedError;
pub use providers::{EmbeddingProcessor, EmbeddingSource, LocalHashEmbedder};
