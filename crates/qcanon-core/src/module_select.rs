//! Margin-band module selection.
//!
//! Each module is embedded once as a composite of the course title, the
//! module name, and every topic and sub-topic phrase. A question keeps every
//! module whose similarity is within `module_margin` of the best one, so a
//! question straddling two modules with close scores keeps both.

use crate::embedding::{dot, embed_batch, EmbeddingProvider};
use crate::error::{CoreError, Result};
use crate::models::SyllabusModule;
use crate::text::normalize_text;

/// A module that survived selection, with its raw similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleScore {
    pub module_id: i64,
    pub score: f32,
}

pub struct ModuleSelector {
    module_ids: Vec<i64>,
    embeddings: Vec<Vec<f32>>,
    margin: f32,
}

impl ModuleSelector {
    /// Embed every module's composite text in one batch.
    pub fn new(
        modules: &[SyllabusModule],
        course_title: &str,
        provider: &dyn EmbeddingProvider,
        margin: f32,
    ) -> Result<Self> {
        if modules.is_empty() {
            return Err(CoreError::MissingInput(
                "module selector needs at least one module".to_string(),
            ));
        }

        let texts: Vec<String> = modules
            .iter()
            .map(|m| module_text(course_title, m))
            .collect();
        let embeddings = embed_batch(provider, &texts)?;
        let module_ids = modules.iter().map(|m| m.module_id).collect();

        Ok(Self::from_embeddings(module_ids, embeddings, margin))
    }

    /// Build from precomputed module embeddings, parallel to `module_ids`.
    pub fn from_embeddings(module_ids: Vec<i64>, embeddings: Vec<Vec<f32>>, margin: f32) -> Self {
        debug_assert_eq!(module_ids.len(), embeddings.len());
        Self {
            module_ids,
            embeddings,
            margin,
        }
    }

    /// Every module scoring at least `best - margin`, in syllabus order.
    pub fn select_modules(&self, question_embedding: &[f32]) -> Vec<ModuleScore> {
        let scores: Vec<f32> = self
            .embeddings
            .iter()
            .map(|e| dot(e, question_embedding))
            .collect();

        let Some(top) = scores.iter().copied().reduce(f32::max) else {
            return Vec::new();
        };
        // Same f32 arithmetic as the scores, so an exact-margin score stays in.
        let cutoff = top - self.margin;

        self.module_ids
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score >= cutoff)
            .map(|(&module_id, score)| ModuleScore { module_id, score })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.module_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.module_ids.is_empty()
    }
}

/// Highest-scoring module; the first one wins a tie.
pub fn best_module(selected: &[ModuleScore]) -> Option<ModuleScore> {
    selected
        .iter()
        .copied()
        .fold(None, |best: Option<ModuleScore>, m| match best {
            Some(b) if b.score >= m.score => Some(b),
            _ => Some(m),
        })
}

/// Normalized composite text: course title, module name, then all topic
/// and sub-topic phrases.
pub fn module_text(course_title: &str, module: &SyllabusModule) -> String {
    let phrases: Vec<&str> = module
        .main_topics
        .iter()
        .flat_map(|t| t.phrases())
        .collect();
    normalize_text(&format!(
        "{} {} {}",
        course_title,
        module.module_name,
        phrases.join(" ")
    ))
}
