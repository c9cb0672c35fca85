//! Blended topic scoring within the selected modules.
//!
//! # Scoring
//!
//! For each topic of an allowed module:
//!
//! 1. `semantic` = similarity of topic and question embeddings. Topics below
//!    `min_semantic_floor` are dropped outright.
//! 2. `concept` = share of the topic's lexical tokens present in the
//!    question (containment, not symmetric Jaccard).
//! 3. `fuzzy` = token-set ratio of the topic tokens against the question
//!    text, which absorbs OCR noise and word-order changes.
//! 4. `final = 0.5·semantic + 0.4·concept + 0.1·fuzzy` (weights configurable),
//!    rounded to four decimals.
//!
//! Topics are then sorted by `final` and every topic within `topic_margin`
//! of the best is kept, up to `max_topics_per_question`.

use std::collections::{BTreeSet, HashSet};

use crate::embedding::{dot, embed_batch, EmbeddingProvider};
use crate::error::Result;
use crate::fuzzy::normalized_token_set_ratio;
use crate::models::{ScoredTopic, SyllabusModule, Topic};
use crate::params::{MappingParams, SCORE_TOLERANCE};
use crate::text::{normalize_text, token_set};

struct TopicEntry {
    module_id: i64,
    name: String,
    tokens: BTreeSet<String>,
    joined_tokens: String,
}

/// Per-signal breakdown of a topic score.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicScore {
    pub module_id: i64,
    pub topic: String,
    pub semantic: f64,
    pub concept: f64,
    pub fuzzy: f64,
    pub confidence: f64,
}

pub struct TopicSelector {
    entries: Vec<TopicEntry>,
    embeddings: Vec<Vec<f32>>,
    params: MappingParams,
}

impl TopicSelector {
    /// Embed every topic (name plus sub-topics, never the description) in
    /// one batch and precompute its lexical token set.
    pub fn new(
        modules: &[SyllabusModule],
        provider: &dyn EmbeddingProvider,
        params: MappingParams,
    ) -> Result<Self> {
        let mut entries = Vec::new();
        let mut texts = Vec::new();

        for module in modules {
            for topic in &module.main_topics {
                let raw = topic_text(topic);
                texts.push(normalize_text(&raw));
                entries.push(TopicEntry::new(module.module_id, &topic.name, &raw));
            }
        }

        let embeddings = embed_batch(provider, &texts)?;
        Ok(Self {
            entries,
            embeddings,
            params,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Select topics for one question. Empty when no topic of an allowed
    /// module clears the semantic floor.
    pub fn select_topics(
        &self,
        question_text: &str,
        question_embedding: &[f32],
        allowed_modules: &[i64],
    ) -> Vec<ScoredTopic> {
        let mut scored = self.score_topics(question_text, question_embedding, allowed_modules);

        // Stable: equal scores keep syllabus order.
        scored.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let Some(top) = scored.first().map(|t| t.confidence) else {
            return Vec::new();
        };
        let cutoff = top - self.params.topic_margin - SCORE_TOLERANCE;

        scored
            .into_iter()
            .filter(|t| t.confidence >= cutoff)
            .take(self.params.max_topics_per_question)
            .map(|t| ScoredTopic {
                module_id: t.module_id,
                topic: t.topic,
                confidence: t.confidence,
            })
            .collect()
    }

    /// Score every topic of the allowed modules that clears the semantic
    /// floor, in syllabus order.
    pub fn score_topics(
        &self,
        question_text: &str,
        question_embedding: &[f32],
        allowed_modules: &[i64],
    ) -> Vec<TopicScore> {
        let allowed: HashSet<i64> = allowed_modules.iter().copied().collect();
        let question_tokens = token_set(question_text);
        let p = &self.params;

        self.entries
            .iter()
            .zip(&self.embeddings)
            .filter(|(entry, _)| allowed.contains(&entry.module_id))
            .filter_map(|(entry, embedding)| {
                let semantic = dot(embedding, question_embedding);
                if semantic < p.min_semantic_floor {
                    return None;
                }
                let semantic = semantic as f64;

                let concept = if entry.tokens.is_empty() {
                    0.0
                } else {
                    let overlap = entry.tokens.intersection(&question_tokens).count();
                    overlap as f64 / entry.tokens.len() as f64
                };

                let fuzzy = normalized_token_set_ratio(&entry.joined_tokens, question_text);

                let blended = p.semantic_weight * semantic
                    + p.concept_weight * concept
                    + p.fuzzy_weight * fuzzy;

                Some(TopicScore {
                    module_id: entry.module_id,
                    topic: entry.name.clone(),
                    semantic,
                    concept,
                    fuzzy,
                    confidence: round4(blended),
                })
            })
            .collect()
    }
}

impl TopicEntry {
    fn new(module_id: i64, name: &str, raw_text: &str) -> Self {
        let tokens = token_set(raw_text);
        let joined_tokens = tokens.iter().cloned().collect::<Vec<_>>().join(" ");
        Self {
            module_id,
            name: name.to_string(),
            tokens,
            joined_tokens,
        }
    }
}

fn topic_text(topic: &Topic) -> String {
    format!("{} {}", topic.name, topic.sub_topics.join(" "))
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
