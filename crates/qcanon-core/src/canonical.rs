//! Canonical question extraction.
//!
//! Mapped questions are grouped by topic name. Each topic with at least two
//! questions is clustered independently; every cluster of two or more
//! members becomes a [`CanonicalGroup`] represented by its medoid.
//!
//! The module-level fallback topic is never canonicalized.

use tracing::{debug, info};

use crate::cluster::{average_linkage, medoid, DistanceMatrix};
use crate::embedding::{embed_batch, EmbeddingProvider};
use crate::error::Result;
use crate::models::{CanonicalGroup, CanonicalOutput, MappedQuestion, Question};
use crate::params::CanonicalParams;

/// Clusters near-duplicate questions per topic.
pub struct CanonicalEngine<'a> {
    provider: &'a dyn EmbeddingProvider,
    params: CanonicalParams,
}

impl<'a> CanonicalEngine<'a> {
    pub fn new(provider: &'a dyn EmbeddingProvider, params: CanonicalParams) -> Self {
        Self { provider, params }
    }

    /// Canonical groups for every topic that shows duplication. Topics with
    /// no group of two or more are absent from the output.
    pub fn canonicalize(&self, mapped: &[MappedQuestion]) -> Result<CanonicalOutput> {
        let by_topic = group_by_topic(mapped);
        let mut output = CanonicalOutput::default();

        for (topic, questions) in &by_topic {
            if questions.len() < 2 {
                debug!(topic = %topic, "single question, skipping");
                continue;
            }
            let groups = self.canonicalize_topic(questions)?;
            if groups.is_empty() {
                debug!(topic = %topic, questions = questions.len(), "no duplicates found");
                continue;
            }
            output.push(topic.clone(), groups);
        }

        info!(
            topics = by_topic.len(),
            canonical_topics = output.len(),
            groups = output.total_groups(),
            "canonical clustering complete"
        );
        Ok(output)
    }

    /// Cluster one topic's questions, embedding their raw text.
    pub fn canonicalize_topic(&self, questions: &[&Question]) -> Result<Vec<CanonicalGroup>> {
        if questions.len() < 2 {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = questions.iter().map(|q| q.text.clone()).collect();
        let embeddings = embed_batch(self.provider, &texts)?;
        let dist = DistanceMatrix::from_embeddings(&embeddings);

        let clusters = average_linkage(&dist, self.params.distance_threshold());

        let mut groups: Vec<CanonicalGroup> = clusters
            .into_iter()
            .filter(|cluster| cluster.len() >= 2)
            .map(|cluster| {
                let center = medoid(&cluster, &dist);
                let mut references: Vec<String> =
                    cluster.iter().map(|&i| questions[i].reference()).collect();
                references.sort();
                CanonicalGroup {
                    canonical_question: questions[center].text.clone(),
                    occurrences: cluster.len(),
                    references,
                }
            })
            .collect();

        // Stable: equal sizes keep discovery order.
        groups.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
        Ok(groups)
    }
}

/// Questions per topic name, in order of each topic's first appearance.
///
/// Fallback topics are excluded. A question listed twice under one topic
/// name (the same name in two modules) is counted once.
pub fn group_by_topic(mapped: &[MappedQuestion]) -> Vec<(String, Vec<&Question>)> {
    let mut groups: Vec<(String, Vec<&Question>)> = Vec::new();

    for mq in mapped {
        for topic in mq.mapped_topics.iter().filter(|t| !t.is_fallback()) {
            let idx = match groups.iter().position(|(name, _)| *name == topic.topic) {
                Some(idx) => idx,
                None => {
                    groups.push((topic.topic.clone(), Vec::new()));
                    groups.len() - 1
                }
            };
            let members = &mut groups[idx].1;
            if !members.iter().any(|q| std::ptr::eq(*q, &mq.question)) {
                members.push(&mq.question);
            }
        }
    }

    groups
}

/// One-shot convenience around [`CanonicalEngine`].
pub fn compute_canonical_questions(
    mapped: &[MappedQuestion],
    provider: &dyn EmbeddingProvider,
    params: CanonicalParams,
) -> Result<CanonicalOutput> {
    CanonicalEngine::new(provider, params).canonicalize(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MappedTopic, FALLBACK_TOPIC};
    use crate::stub::StubEmbedder;
    use crate::CoreError;

    fn mapped(paper: &str, number: &str, text: &str, topics: &[&str]) -> MappedQuestion {
        MappedQuestion {
            question: Question {
                paper_name: paper.to_string(),
                question_number: number.to_string(),
                text: text.to_string(),
                marks: 4.0,
            },
            mapped_topics: topics
                .iter()
                .map(|t| MappedTopic {
                    module_id: 1,
                    topic: t.to_string(),
                    confidence: 0.8,
                    allocated_marks: 4.0 / topics.len() as f64,
                })
                .collect(),
        }
    }

    fn stub() -> StubEmbedder {
        StubEmbedder::new(4)
            .with_rule("half adder", &[1.0, 0.0, 0.0, 0.0])
            .with_rule("full adder", &[0.8, 0.6, 0.0, 0.0])
            .with_rule("carry", &[0.0, 0.0, 1.0, 0.0])
    }

    #[test]
    fn test_half_adder_pair_merges() {
        let s = stub();
        let input = vec![
            mapped("p2.json", "3", "Describe the working principle of a half adder", &["Adders"]),
            mapped("p1.json", "1", "Explain the working of a half adder circuit", &["Adders"]),
        ];
        let out = compute_canonical_questions(&input, &s, CanonicalParams::default()).unwrap();
        let groups = out.get("Adders").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].occurrences, 2);
        assert_eq!(groups[0].references, vec!["p1.json - 1", "p2.json - 3"]);
        // Tie on distance sums: the first member wins.
        assert_eq!(
            groups[0].canonical_question,
            "Describe the working principle of a half adder"
        );
    }

    #[test]
    fn test_singletons_dropped() {
        let s = stub();
        let input = vec![
            mapped("a.json", "1", "half adder truth table", &["Adders"]),
            mapped("b.json", "1", "half adder using nand gates", &["Adders"]),
            mapped("c.json", "1", "carry lookahead generator", &["Adders"]),
        ];
        let out = compute_canonical_questions(&input, &s, CanonicalParams::default()).unwrap();
        let groups = out.get("Adders").unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].occurrences, 2);
        assert!(groups.iter().all(|g| g.occurrences >= 2));
    }

    #[test]
    fn test_topic_without_duplicates_absent() {
        let s = stub();
        let input = vec![
            mapped("a.json", "1", "half adder", &["Adders"]),
            mapped("b.json", "1", "carry chain", &["Adders"]),
            mapped("c.json", "1", "half adder again", &["Lonely"]),
        ];
        let out = compute_canonical_questions(&input, &s, CanonicalParams::default()).unwrap();
        assert!(out.is_empty());
        assert!(out.get("Lonely").is_none());
    }

    #[test]
    fn test_fallback_topic_excluded() {
        let s = stub();
        let input = vec![
            mapped("a.json", "1", "half adder", &[FALLBACK_TOPIC]),
            mapped("b.json", "1", "half adder", &[FALLBACK_TOPIC]),
        ];
        let out = compute_canonical_questions(&input, &s, CanonicalParams::default()).unwrap();
        assert!(out.is_empty());
        assert_eq!(s.calls(), 0);
    }

    #[test]
    fn test_groups_sorted_by_occurrences() {
        let s = stub();
        let input = vec![
            mapped("a.json", "1", "carry chain", &["Adders"]),
            mapped("a.json", "2", "carry save", &["Adders"]),
            mapped("b.json", "1", "half adder", &["Adders"]),
            mapped("b.json", "2", "half adder design", &["Adders"]),
            mapped("c.json", "1", "half adder nand", &["Adders"]),
        ];
        let out = compute_canonical_questions(&input, &s, CanonicalParams::default()).unwrap();
        let sizes: Vec<usize> = out.get("Adders").unwrap().iter().map(|g| g.occurrences).collect();
        assert_eq!(sizes, vec![3, 2]);
    }

    #[test]
    fn test_group_by_topic_first_appearance_and_dedup() {
        let input = vec![
            mapped("a.json", "1", "x", &["Counters", "Adders", "Adders"]),
            mapped("b.json", "1", "y", &["Adders"]),
        ];
        let groups = group_by_topic(&input);
        let names: Vec<&str> = groups.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Counters", "Adders"]);
        assert_eq!(groups[1].1.len(), 2);
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let s = StubEmbedder::failing(4);
        let input = vec![
            mapped("a.json", "1", "half adder", &["Adders"]),
            mapped("b.json", "1", "half adder", &["Adders"]),
        ];
        let err = compute_canonical_questions(&input, &s, CanonicalParams::default()).unwrap_err();
        assert!(matches!(err, CoreError::OracleFailure(_)));
    }
}
