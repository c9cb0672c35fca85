//! Tuning parameters, decoupled from application config.
//!
//! Defaults reproduce the reference behaviour; the app crate fills these
//! from `[mapping]` and `[canonical]` in the TOML config.

/// Module and topic selection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingParams {
    /// Keep every module scoring within this distance of the best module.
    pub module_margin: f32,
    /// Keep every topic scoring within this distance of the best topic.
    pub topic_margin: f64,
    /// Topics with semantic similarity below this are never scored.
    pub min_semantic_floor: f32,
    /// Upper bound on topics assigned to one question.
    pub max_topics_per_question: usize,
    /// Weights for `final = w_s·semantic + w_c·concept + w_f·fuzzy`.
    pub semantic_weight: f64,
    pub concept_weight: f64,
    pub fuzzy_weight: f64,
    /// Confidence reported for the module-level fallback topic.
    pub fallback_confidence: f64,
}

impl Default for MappingParams {
    fn default() -> Self {
        Self {
            module_margin: 0.05,
            topic_margin: 0.03,
            min_semantic_floor: 0.20,
            max_topics_per_question: 4,
            semantic_weight: 0.5,
            concept_weight: 0.4,
            fuzzy_weight: 0.1,
            fallback_confidence: 0.30,
        }
    }
}

/// Canonical clustering parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalParams {
    /// Questions at least this similar may end up in one cluster.
    pub similarity_threshold: f64,
}

impl CanonicalParams {
    /// Average-linkage merges stop above this cosine distance.
    pub fn distance_threshold(&self) -> f64 {
        1.0 - self.similarity_threshold
    }
}

impl Default for CanonicalParams {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.45,
        }
    }
}

/// Slack at the topic-margin edge, where `top - margin` is computed in f64.
/// Far below the 1e-4 step of rounded confidences.
pub(crate) const SCORE_TOLERANCE: f64 = 1e-6;
