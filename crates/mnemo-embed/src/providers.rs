//! Embedding backends.
//!
//! [`EmbeddingProcessor`] dispatches over the configured source. The HTTP
//! backends follow the provider wire formats; [`LocalHashEmbedder`] is a
//! deterministic bag-of-words embedder so tests and air-gapped projects never
//! touch the network.

use crate::config::{EmbeddingConfig, HuggingFaceConfig, OpenAIConfig};
use crate::error::EmbedError;

#[derive(Debug)]
pub struct EmbeddingProcessor {
    source: EmbeddingSource,
}

#[derive(Debug)]
pub enum EmbeddingSource {
    Local(LocalHashEmbedder),
    OpenAI(OpenAIBackend),
    HuggingFace(HuggingFaceBackend),
}

impl EmbeddingProcessor {
    pub fn new(source: EmbeddingSource) -> Self {
        Self { source }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let source = match config {
            EmbeddingConfig::Local { dimensions } => {
                EmbeddingSource::Local(LocalHashEmbedder::new(*dimensions))
            }
            EmbeddingConfig::OpenAI(c) => EmbeddingSource::OpenAI(OpenAIBackend::new(c)),
            EmbeddingConfig::HuggingFace(c) => {
                EmbeddingSource::HuggingFace(HuggingFaceBackend::new(c))
            }
        };
        Self { source }
    }

    /// Deterministic local embedder, the default for tests.
    pub fn new_local(dimensions: usize) -> Self {
        Self::new(EmbeddingSource::Local(LocalHashEmbedder::new(dimensions)))
    }

    pub async fn generate_embeddings(
        &self,
        snippets: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        match &self.source {
            EmbeddingSource::Local(backend) => Ok(backend.embed_batch(&snippets)),
            EmbeddingSource::OpenAI(backend) => backend.compute_batch(snippets).await,
            EmbeddingSource::HuggingFace(backend) => backend.compute_batch(snippets).await,
        }
    }

    pub fn dimensions(&self) -> usize {
        match &self.source {
            EmbeddingSource::Local(backend) => backend.dimensions,
            EmbeddingSource::OpenAI(backend) => backend.dimensions,
            EmbeddingSource::HuggingFace(backend) => backend.dimensions,
        }
    }

    /// Stable identifier of the underlying model; part of result-cache keys.
    pub fn model_id(&self) -> String {
        match &self.source {
            EmbeddingSource::Local(backend) => format!("local-hash-{}", backend.dimensions),
            EmbeddingSource::OpenAI(backend) => backend.model.clone(),
            EmbeddingSource::HuggingFace(backend) => backend.model.clone(),
        }
    }
}

// --- local -------------------------------------------------------------------

/// Bag-of-words hashing embedder: each lowercase alphanumeric term is hashed
/// into a bucket, counts are accumulated, and the vector is L2-normalized.
/// Identical text always embeds identically, and texts sharing terms have
/// positive cosine similarity.
#[derive(Debug)]
pub struct LocalHashEmbedder {
    pub dimensions: usize,
}

impl LocalHashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for term in text
            .to_lowercase()
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| t.len() >= 2)
        {
            let digest = blake3::hash(term.as_bytes());
            let bucket = u64::from_le_bytes(digest.as_bytes()[..8].try_into().unwrap())
                as usize
                % self.dimensions;
            v[bucket] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    pub fn embed_batch(&self, snippets: &[String]) -> Vec<Vec<f32>> {
        snippets.iter().map(|s| self.embed(s)).collect()
    }
}

// --- OpenAI ------------------------------------------------------------------

#[derive(Debug)]
pub struct OpenAIBackend {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
}

impl OpenAIBackend {
    pub fn new(config: &OpenAIConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        }
    }

    pub async fn compute_batch(&self, snippets: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedError> {
        let client = reqwest::Client::new();
        let request = OpenAIEmbedRequest {
            model: self.model.clone(),
            input: snippets,
        };

        let res = client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(EmbedError::Api {
                status: res.status().as_u16(),
                body: res.text().await?,
            });
        }

        let response = res.json::<OpenAIEmbedResponse>().await?;
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(serde::Serialize)]
struct OpenAIEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(serde::Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
}

#[derive(serde::Deserialize)]
struct OpenAIEmbedResponse {
    data: Vec<OpenAIEmbedding>,
}

// --- HuggingFace -------------------------------------------------------------

#[derive(Debug)]
pub struct HuggingFaceBackend {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
}

impl HuggingFaceBackend {
    pub fn new(config: &HuggingFaceConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        }
    }

    pub async fn compute_batch(&self, snippets: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedError> {
        let api_url = format!("https://api-inference.huggingface.co/models/{}", self.model);
        let client = reqwest::Client::new();
        let request = HfEmbedRequest { inputs: snippets };

        let res = client
            .post(&api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !res.status().is_success() {
            // 503 means the model is still loading; surface it as-is, the
            // caller decides whether to retry.
            return Err(EmbedError::Api {
                status: res.status().as_u16(),
                body: res.text().await?,
            });
        }

        Ok(res.json::<Vec<Vec<f32>>>().await?)
    }
}

#[derive(serde::Serialize)]
struct HfEmbedRequest {
    inputs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn local_embedder_is_deterministic() {
        let e = LocalHashEmbedder::new(64);
        assert_eq!(e.embed("use jwt for auth"), e.embed("use jwt for auth"));
    }

    #[test]
    fn local_embedder_reflects_term_overlap() {
        let e = LocalHashEmbedder::new(128);
        let a = e.embed("jwt authentication decision");
        let b = e.embed("authentication with jwt tokens");
        let c = e.embed("database migration checklist");
        assert!(cosine(&a, &b) > cosine(&a, &c));
    }

    #[test]
    fn local_embedder_normalizes() {
        let e = LocalHashEmbedder::new(32);
        let v = e.embed("some words here");
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn processor_reports_model_id() {
        let p = EmbeddingProcessor::new_local(16);
        assert_eq!(p.model_id(), "local-hash-16");
        assert_eq!(p.dimensions(), 16);
    }
}
