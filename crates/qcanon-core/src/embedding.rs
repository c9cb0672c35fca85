//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that every embedding backend
//! implements, plus the vector helpers the selectors and the clustering
//! engine share. Concrete providers (fastembed, tract, OpenAI, Ollama,
//! feature hashing) live in the `qcanon` app crate and are passed in by
//! reference; the core never constructs one.

use anyhow::anyhow;

use crate::error::{CoreError, Result};

/// Trait for embedding providers.
///
/// `embed` must return one vector per input text, in input order, each
/// unit-normalized so that cosine similarity reduces to a dot product.
/// Output must be deterministic for a fixed model.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Embed a batch and check that the provider kept its side of the contract.
///
/// Any provider error, count mismatch, or ragged batch becomes
/// [`CoreError::OracleFailure`].
pub fn embed_batch(provider: &dyn EmbeddingProvider, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = provider.embed(texts).map_err(CoreError::oracle)?;

    if vectors.len() != texts.len() {
        return Err(CoreError::oracle(anyhow!(
            "{} returned {} embeddings for {} texts",
            provider.model_name(),
            vectors.len(),
            texts.len()
        )));
    }

    let dims = vectors[0].len();
    if dims == 0 || vectors.iter().any(|v| v.len() != dims) {
        return Err(CoreError::oracle(anyhow!(
            "{} returned embeddings of inconsistent dimensionality",
            provider.model_name()
        )));
    }

    Ok(vectors)
}

/// Dot product of two equal-length vectors.
///
/// For unit-normalized embeddings this is the cosine similarity. Returns
/// `0.0` for empty vectors or vectors of different lengths.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine distance between unit-normalized vectors: `1 - a·b`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - dot(a, b) as f64
}

/// Scale a vector to unit length. Near-zero vectors are returned unchanged.
pub fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
