//! Fixed-output embedding provider for tests and examples.
//!
//! [`StubEmbedder`] maps text to vectors by keyword rules: the first rule
//! whose keyword occurs in the lowercased text wins, otherwise the text maps
//! to the last axis. Output is deterministic and unit-normalized, which
//! makes scoring and clustering outcomes exact to reason about.

use anyhow::bail;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embedding::{normalize_l2, EmbeddingProvider};

pub struct StubEmbedder {
    dims: usize,
    rules: Vec<(String, Vec<f32>)>,
    fallback: Vec<f32>,
    failing: bool,
    calls: AtomicUsize,
}

impl StubEmbedder {
    /// A stub with no rules. Unmatched text maps to the last axis.
    pub fn new(dims: usize) -> Self {
        let mut fallback = vec![0.0; dims];
        if let Some(last) = fallback.last_mut() {
            *last = 1.0;
        }
        Self {
            dims,
            rules: Vec::new(),
            fallback,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A stub whose every `embed` call fails.
    pub fn failing(dims: usize) -> Self {
        Self {
            failing: true,
            ..Self::new(dims)
        }
    }

    /// Map any text containing `keyword` to `vector` (padded or cut to `dims`).
    pub fn with_rule(mut self, keyword: &str, vector: &[f32]) -> Self {
        let v = self.fit(vector);
        self.rules.push((keyword.to_lowercase(), v));
        self
    }

    /// Number of `embed` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fit(&self, vector: &[f32]) -> Vec<f32> {
        let mut v = vector.to_vec();
        v.resize(self.dims, 0.0);
        normalize_l2(v)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| lower.contains(keyword.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl EmbeddingProvider for StubEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            bail!("stub embedder configured to fail");
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}
