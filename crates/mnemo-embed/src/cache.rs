//! Embedding cache: persistent `(model, content_hash)` rows plus in-flight
//! coalescing.
//!
//! Identical `(text, model)` pairs share one provider call: the first caller
//! computes, concurrent callers await the same cell. Safe across concurrent
//! callers; a failed computation leaves the cell empty so the next caller
//! retries.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use mnemo_db::{dt_to_ms, Database};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::EmbedError;
use crate::providers::EmbeddingProcessor;

#[derive(Debug)]
pub struct CachedEmbedder {
    inner: Arc<EmbeddingProcessor>,
    db: Arc<Database>,
    inflight: DashMap<String, Arc<OnceCell<Vec<f32>>>>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<EmbeddingProcessor>, db: Arc<Database>) -> Self {
        Self {
            inner,
            db,
            inflight: DashMap::new(),
        }
    }

    pub fn processor(&self) -> &EmbeddingProcessor {
        &self.inner
    }

    pub fn model_id(&self) -> String {
        self.inner.model_id()
    }

    pub fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    /// Embed one text, serving repeats from the persistent cache and
    /// coalescing concurrent identical requests.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let model = self.inner.model_id();
        let content_hash = blake3::hash(text.as_bytes()).to_hex().to_string();

        if let Some(hit) = self.db.get_cached_embedding(&model, &content_hash)? {
            debug!(model = %model, "embedding cache hit");
            return Ok(hit);
        }

        let key = format!("{model}:{content_hash}");
        let cell = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_try_init(|| async {
                let mut vectors = self
                    .inner
                    .generate_embeddings(vec![text.to_string()])
                    .await?;
                let vector = vectors
                    .pop()
                    .ok_or_else(|| EmbedError::Provider("empty embedding batch".into()))?;
                self.db
                    .put_cached_embedding(&model, &content_hash, &vector, dt_to_ms(Utc::now()))?;
                Ok::<_, EmbedError>(vector)
            })
            .await
            .cloned();

        // The persistent row now serves future calls; drop the cell.
        if result.is_ok() {
            self.inflight.remove(&key);
        }
        result
    }

    /// Embed a batch; each text goes through the per-text cache path.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }
}
