//! Topic assignment pipeline.
//!
//! For each question, in order:
//!
//! 1. Normalize the text and expand known acronyms in place.
//! 2. Embed the expanded text (all questions go to the provider as one batch).
//! 3. Select modules by margin band, then topics within those modules.
//! 4. If no topic clears the semantic floor but a module was selected, assign
//!    the synthetic [`FALLBACK_TOPIC`] under the best module.
//! 5. Split the question's marks equally across the assigned topics.
//!
//! Construction validates the syllabus before any embedding work begins.

use tracing::{debug, info};

use crate::embedding::{embed_batch, EmbeddingProvider};
use crate::error::{CoreError, Result};
use crate::models::{
    MappedQuestion, MappedTopic, Question, ScoredTopic, SyllabusModule, FALLBACK_TOPIC,
};
use crate::module_select::{best_module, ModuleScore, ModuleSelector};
use crate::params::MappingParams;
use crate::text::{expand_acronyms, extract_acronyms, normalize_text, AcronymMap};
use crate::topic_select::TopicSelector;

/// Maps questions onto the topics of a (possibly scoped) syllabus.
pub struct TopicMapper<'a> {
    provider: &'a dyn EmbeddingProvider,
    acronyms: AcronymMap,
    modules: ModuleSelector,
    topics: TopicSelector,
    params: MappingParams,
}

impl<'a> TopicMapper<'a> {
    pub fn new(
        modules: &[SyllabusModule],
        course_title: &str,
        provider: &'a dyn EmbeddingProvider,
        params: MappingParams,
    ) -> Result<Self> {
        if modules.is_empty() {
            return Err(CoreError::MissingInput(
                "no syllabus modules in scope".to_string(),
            ));
        }
        if let Some(m) = modules.iter().find(|m| m.main_topics.is_empty()) {
            return Err(CoreError::MissingInput(format!(
                "module {} has no topics",
                m.module_id
            )));
        }

        let acronyms = extract_acronyms(modules);
        let module_selector =
            ModuleSelector::new(modules, course_title, provider, params.module_margin)?;
        let topic_selector = TopicSelector::new(modules, provider, params.clone())?;

        info!(
            modules = module_selector.len(),
            topics = topic_selector.len(),
            acronyms = acronyms.len(),
            model = provider.model_name(),
            "topic mapper ready"
        );

        Ok(Self {
            provider,
            acronyms,
            modules: module_selector,
            topics: topic_selector,
            params,
        })
    }

    pub fn acronyms(&self) -> &AcronymMap {
        &self.acronyms
    }

    /// Normalized, acronym-expanded text used for scoring.
    pub fn prepare_text(&self, text: &str) -> String {
        expand_acronyms(&normalize_text(text), &self.acronyms)
    }

    /// Map a batch of questions. Fails as a whole: either every question is
    /// mapped or an error is returned.
    pub fn map_questions(&self, questions: &[Question]) -> Result<Vec<MappedQuestion>> {
        let prepared: Vec<String> = questions
            .iter()
            .map(|q| self.prepare_text(&q.text))
            .collect();
        let embeddings = embed_batch(self.provider, &prepared)?;

        let mut fallbacks = 0usize;
        let mapped: Vec<MappedQuestion> = questions
            .iter()
            .zip(prepared.iter().zip(&embeddings))
            .map(|(question, (text, embedding))| {
                let topics = self.assign_topics(text, embedding);
                if topics.first().is_some_and(|t| t.topic == FALLBACK_TOPIC) {
                    fallbacks += 1;
                    debug!(
                        paper = %question.paper_name,
                        number = %question.question_number,
                        "no topic cleared the semantic floor, using module fallback"
                    );
                }
                MappedQuestion {
                    question: question.clone(),
                    mapped_topics: allocate_marks(question.marks, topics),
                }
            })
            .collect();

        info!(questions = mapped.len(), fallbacks, "mapping complete");
        Ok(mapped)
    }

    /// Map a single question.
    pub fn map_question(&self, question: &Question) -> Result<MappedQuestion> {
        let mut mapped = self.map_questions(std::slice::from_ref(question))?;
        mapped
            .pop()
            .ok_or_else(|| CoreError::oracle(anyhow::anyhow!("empty mapping result")))
    }

    /// Module selection, topic selection, then fallback.
    fn assign_topics(&self, text: &str, embedding: &[f32]) -> Vec<ScoredTopic> {
        let selected_modules = self.modules.select_modules(embedding);
        let allowed: Vec<i64> = selected_modules.iter().map(|m| m.module_id).collect();

        let topics = self.topics.select_topics(text, embedding, &allowed);
        if !topics.is_empty() {
            return topics;
        }

        fallback_topic(&selected_modules, self.params.fallback_confidence)
            .into_iter()
            .collect()
    }
}

/// The synthetic fallback topic under the best selected module, if any.
pub fn fallback_topic(selected: &[ModuleScore], confidence: f64) -> Option<ScoredTopic> {
    best_module(selected).map(|m| ScoredTopic {
        module_id: m.module_id,
        topic: FALLBACK_TOPIC.to_string(),
        confidence,
    })
}

/// Split `marks` equally across `topics`.
pub fn allocate_marks(marks: f64, topics: Vec<ScoredTopic>) -> Vec<MappedTopic> {
    if topics.is_empty() {
        return Vec::new();
    }
    let share = marks / topics.len() as f64;
    topics
        .into_iter()
        .map(|t| MappedTopic {
            module_id: t.module_id,
            topic: t.topic,
            confidence: t.confidence,
            allocated_marks: share,
        })
        .collect()
}

/// One-shot convenience: build a [`TopicMapper`] and map `questions`.
pub fn map_questions_to_topics(
    questions: &[Question],
    modules: &[SyllabusModule],
    course_title: &str,
    provider: &dyn EmbeddingProvider,
    params: MappingParams,
) -> Result<Vec<MappedQuestion>> {
    TopicMapper::new(modules, course_title, provider, params)?.map_questions(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Topic;
    use crate::stub::StubEmbedder;

    fn scored(module_id: i64, topic: &str) -> ScoredTopic {
        ScoredTopic {
            module_id,
            topic: topic.to_string(),
            confidence: 0.5,
        }
    }

    fn question(text: &str, marks: f64) -> Question {
        Question {
            paper_name: "paper.json".to_string(),
            question_number: "1".to_string(),
            text: text.to_string(),
            marks,
        }
    }

    fn modules() -> Vec<SyllabusModule> {
        vec![SyllabusModule {
            module_id: 1,
            module_name: "Sequential Logic".to_string(),
            main_topics: vec![Topic {
                name: "Finite State Machine (FSM)".to_string(),
                sub_topics: vec!["Mealy Machine".to_string()],
                description: String::new(),
            }],
        }]
    }

    #[test]
    fn test_allocate_marks_equal_split() {
        let mapped = allocate_marks(10.0, vec![scored(1, "A"), scored(1, "B"), scored(2, "C")]);
        let total: f64 = mapped.iter().map(|t| t.allocated_marks).sum();
        assert!((total - 10.0).abs() < 1e-9);
        assert!(mapped.iter().all(|t| (t.allocated_marks - 10.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_allocate_marks_empty() {
        assert!(allocate_marks(5.0, vec![]).is_empty());
    }

    #[test]
    fn test_fallback_uses_best_module() {
        let selected = vec![
            ModuleScore { module_id: 1, score: 0.40 },
            ModuleScore { module_id: 2, score: 0.42 },
        ];
        let t = fallback_topic(&selected, 0.30).unwrap();
        assert_eq!(t.module_id, 2);
        assert_eq!(t.topic, FALLBACK_TOPIC);
        assert_eq!(t.confidence, 0.30);
        assert!(fallback_topic(&[], 0.30).is_none());
    }

    #[test]
    fn test_prepare_text_expands_acronyms() {
        let stub = StubEmbedder::new(3);
        let mapper =
            TopicMapper::new(&modules(), "Digital Design", &stub, MappingParams::default()).unwrap();
        assert_eq!(
            mapper.prepare_text("Minimize the\nFSM"),
            "minimize the fsm (Finite State Machine (FSM))"
        );
        assert_eq!(mapper.acronyms().get("MM").unwrap(), "Mealy Machine");
    }

    #[test]
    fn test_rejects_empty_modules_before_embedding() {
        let stub = StubEmbedder::new(3);
        let err = TopicMapper::new(&[], "X", &stub, MappingParams::default())
            .err()
            .unwrap();
        assert!(matches!(err, CoreError::MissingInput(_)));
        assert_eq!(stub.calls(), 0);
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let stub = StubEmbedder::failing(3);
        let err = map_questions_to_topics(
            &[question("anything", 2.0)],
            &modules(),
            "X",
            &stub,
            MappingParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::OracleFailure(_)));
    }

    #[test]
    fn test_map_question_fallback() {
        // The question aligns with the module but with no topic.
        let stub = StubEmbedder::new(3)
            .with_rule("sequential logic", &[1.0, 0.0, 0.0])
            .with_rule("finite state machine", &[0.0, 1.0, 0.0])
            .with_rule("timing", &[0.9, 0.0, 0.436]);
        let mapper =
            TopicMapper::new(&modules(), "Digital Design", &stub, MappingParams::default()).unwrap();
        let mapped = mapper.map_question(&question("Discuss setup timing", 6.0)).unwrap();
        assert_eq!(mapped.mapped_topics.len(), 1);
        let t = &mapped.mapped_topics[0];
        assert_eq!(t.topic, FALLBACK_TOPIC);
        assert_eq!(t.module_id, 1);
        assert_eq!(t.confidence, 0.30);
        assert_eq!(t.allocated_marks, 6.0);
    }
}
