//! Core data models for topic mapping and canonical clustering.
//!
//! Field names follow the JSON produced by the upstream extraction stages
//! (`main_topic`, `desc`, ...) so records deserialize directly. Required
//! fields have no serde default: a malformed record fails at the boundary.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;

use crate::error::{CoreError, Result};

/// Topic name given to questions that matched a module but none of its topics.
pub const FALLBACK_TOPIC: &str = "Module-Level Fallback";

/// A single exam question, unified across papers and sub-questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub paper_name: String,
    pub question_number: String,
    pub text: String,
    pub marks: f64,
}

impl Question {
    /// `"<paper_name> - <question_number>"`, the form used in canonical references.
    pub fn reference(&self) -> String {
        format!("{} - {}", self.paper_name, self.question_number)
    }
}

/// A main topic inside a syllabus module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(rename = "main_topic")]
    pub name: String,
    #[serde(default)]
    pub sub_topics: Vec<String>,
    /// Free-text description. Carried through but never scored.
    #[serde(rename = "desc", default)]
    pub description: String,
}

impl Topic {
    /// The topic name followed by its sub-topics, in syllabus order.
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.sub_topics.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllabusModule {
    pub module_id: i64,
    pub module_name: String,
    pub main_topics: Vec<Topic>,
}

/// An enriched syllabus: course identity plus its modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Syllabus {
    pub course_code: String,
    pub course_title: String,
    pub modules: Vec<SyllabusModule>,
}

impl Syllabus {
    /// Drop modules without topics and reject syllabi that are left empty
    /// or that reuse a module id.
    pub fn into_effective(mut self) -> Result<Self> {
        if self.modules.is_empty() {
            return Err(CoreError::MissingInput(format!(
                "syllabus {} has no modules",
                self.course_code
            )));
        }

        let mut seen = HashSet::new();
        for module in &self.modules {
            if !seen.insert(module.module_id) {
                return Err(CoreError::MissingInput(format!(
                    "duplicate module id {} in syllabus {}",
                    module.module_id, self.course_code
                )));
            }
        }

        self.modules.retain(|m| {
            let keep = !m.main_topics.is_empty();
            if !keep {
                tracing::warn!(module_id = m.module_id, "skipping module with no topics");
            }
            keep
        });

        if self.modules.is_empty() {
            return Err(CoreError::MissingInput(format!(
                "syllabus {} has no modules with topics",
                self.course_code
            )));
        }

        Ok(self)
    }

    /// Highest module id present, if any.
    pub fn max_module_id(&self) -> Option<i64> {
        self.modules.iter().map(|m| m.module_id).max()
    }
}

/// A topic chosen for a question, before marks are allocated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTopic {
    pub module_id: i64,
    pub topic: String,
    pub confidence: f64,
}

/// A scored topic carrying its share of the question's marks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedTopic {
    pub module_id: i64,
    pub topic: String,
    pub confidence: f64,
    pub allocated_marks: f64,
}

impl MappedTopic {
    pub fn is_fallback(&self) -> bool {
        self.topic == FALLBACK_TOPIC
    }
}

/// A question together with the topics it was assigned to.
///
/// `allocated_marks` across `mapped_topics` always sums to `marks` when the
/// list is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedQuestion {
    #[serde(flatten)]
    pub question: Question,
    pub mapped_topics: Vec<MappedTopic>,
}

/// A representative question standing in for a cluster of near-duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalGroup {
    pub canonical_question: String,
    pub occurrences: usize,
    pub references: Vec<String>,
}

/// Canonical groups per topic, in order of each topic's first appearance.
///
/// Serializes as a JSON object keyed by topic name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalOutput {
    topics: Vec<(String, Vec<CanonicalGroup>)>,
}

impl CanonicalOutput {
    pub(crate) fn push(&mut self, topic: String, groups: Vec<CanonicalGroup>) {
        self.topics.push((topic, groups));
    }

    pub fn get(&self, topic: &str) -> Option<&[CanonicalGroup]> {
        self.topics
            .iter()
            .find(|(name, _)| name == topic)
            .map(|(_, groups)| groups.as_slice())
    }

    /// Number of topics with at least one canonical group.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn total_groups(&self) -> usize {
        self.topics.iter().map(|(_, groups)| groups.len()).sum()
    }
}

impl Serialize for CanonicalOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.topics.len()))?;
        for (topic, groups) in &self.topics {
            map.serialize_entry(topic, groups)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: i64, topics: &[&str]) -> SyllabusModule {
        SyllabusModule {
            module_id: id,
            module_name: format!("Module {}", id),
            main_topics: topics
                .iter()
                .map(|t| Topic {
                    name: t.to_string(),
                    sub_topics: vec![],
                    description: String::new(),
                })
                .collect(),
        }
    }

    fn syllabus(modules: Vec<SyllabusModule>) -> Syllabus {
        Syllabus {
            course_code: "EE201".to_string(),
            course_title: "Digital Electronics".to_string(),
            modules,
        }
    }

    #[test]
    fn test_effective_drops_empty_modules() {
        let s = syllabus(vec![module(1, &["Adders"]), module(2, &[])])
            .into_effective()
            .unwrap();
        assert_eq!(s.modules.len(), 1);
        assert_eq!(s.max_module_id(), Some(1));
    }

    #[test]
    fn test_effective_rejects_empty_syllabus() {
        let err = syllabus(vec![]).into_effective().unwrap_err();
        assert!(matches!(err, CoreError::MissingInput(_)));

        let err = syllabus(vec![module(1, &[])]).into_effective().unwrap_err();
        assert!(matches!(err, CoreError::MissingInput(_)));
    }

    #[test]
    fn test_effective_rejects_duplicate_ids() {
        let err = syllabus(vec![module(1, &["A"]), module(1, &["B"])])
            .into_effective()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate module id 1"));
    }

    #[test]
    fn test_syllabus_json_shape() {
        let json = r#"{
            "course_code": "EE201",
            "course_title": "Digital Electronics",
            "modules": [{
                "module_id": 1,
                "module_name": "Combinational Circuits",
                "main_topics": [
                    {"main_topic": "Adders", "sub_topics": ["Half Adder"], "desc": "sums"}
                ]
            }]
        }"#;
        let s: Syllabus = serde_json::from_str(json).unwrap();
        assert_eq!(s.modules[0].main_topics[0].name, "Adders");
        assert_eq!(s.modules[0].main_topics[0].description, "sums");
    }

    #[test]
    fn test_question_requires_text() {
        let json = r#"{"paper_name": "p1.json", "question_number": "1a", "marks": 5}"#;
        assert!(serde_json::from_str::<Question>(json).is_err());
    }

    #[test]
    fn test_mapped_question_flattens() {
        let mq = MappedQuestion {
            question: Question {
                paper_name: "p1.json".to_string(),
                question_number: "2".to_string(),
                text: "Define a latch".to_string(),
                marks: 4.0,
            },
            mapped_topics: vec![],
        };
        let v = serde_json::to_value(&mq).unwrap();
        assert_eq!(v["paper_name"], "p1.json");
        assert_eq!(v["marks"], 4.0);
        assert!(v["mapped_topics"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_canonical_output_serializes_in_insertion_order() {
        let mut out = CanonicalOutput::default();
        out.push("Zeta".to_string(), vec![]);
        out.push("Alpha".to_string(), vec![]);
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(json, r#"{"Zeta":[],"Alpha":[]}"#);
    }
}
