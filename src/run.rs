//! Run orchestration: load, gate, scope, map, cluster, write.
//!
//! A run either completes every stage or fails without touching the output
//! directory. Outputs are serialized only after clustering succeeds.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use qcanon_core::canonical::CanonicalEngine;
use qcanon_core::embedding::EmbeddingProvider;
use qcanon_core::models::{CanonicalOutput, MappedQuestion, Question, Syllabus};
use qcanon_core::pipeline::TopicMapper;
use qcanon_core::range::{filter_mapped_by_range, filter_modules, ModuleRange};

use crate::config::Config;
use crate::export;
use crate::loader;

/// Where the questions of a run come from.
#[derive(Debug, Clone)]
pub enum QuestionSource {
    /// A directory of per-paper JSON files, checked against the syllabus course.
    Papers(PathBuf),
    /// A pre-unified JSON array of questions. No subject gate is applied.
    Questions(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub syllabus: PathBuf,
    pub source: QuestionSource,
    pub start_module: Option<i64>,
    pub end_module: Option<i64>,
    pub output_dir: Option<PathBuf>,
}

/// Counts and paths from a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub course_code: String,
    pub range: ModuleRange,
    pub questions: usize,
    pub mapped: usize,
    pub out_of_range: usize,
    pub fallbacks: usize,
    pub canonical_topics: usize,
    pub canonical_groups: usize,
    pub mapped_path: PathBuf,
    pub canonical_path: PathBuf,
}

/// Load questions from `source`, applying the subject gate to paper files.
pub fn load_questions(source: &QuestionSource, syllabus: &Syllabus) -> Result<Vec<Question>> {
    let questions = match source {
        QuestionSource::Papers(dir) => {
            let papers = loader::load_papers(dir)?;
            loader::check_subject(&papers, &syllabus.course_code)?;
            loader::unify_questions(&papers)
        }
        QuestionSource::Questions(path) => loader::load_questions_file(path)?,
    };

    if questions.is_empty() {
        anyhow::bail!("No questions to map");
    }
    tracing::info!(questions = questions.len(), "questions loaded");
    Ok(questions)
}

/// Module range from CLI flags, then `[scope]`, then the whole syllabus.
pub fn resolve_range(
    config: &Config,
    start_module: Option<i64>,
    end_module: Option<i64>,
    syllabus: &Syllabus,
) -> Result<ModuleRange> {
    let max_valid = syllabus
        .max_module_id()
        .context("Syllabus has no modules")?;
    let start = start_module.or(config.scope.start_module).unwrap_or(1);
    let end = end_module.or(config.scope.end_module).unwrap_or(max_valid);
    Ok(ModuleRange::new(start, end, max_valid)?)
}

/// Map `questions` onto the modules of `syllabus` that fall inside `range`.
pub fn map_in_range(
    config: &Config,
    syllabus: &Syllabus,
    range: ModuleRange,
    questions: &[Question],
    provider: &dyn EmbeddingProvider,
) -> Result<Vec<MappedQuestion>> {
    let modules = filter_modules(&syllabus.modules, range)?;
    let mapper = TopicMapper::new(
        &modules,
        &syllabus.course_title,
        provider,
        config.mapping.to_params(),
    )?;
    Ok(mapper.map_questions(questions)?)
}

/// The full pipeline. Nothing is written unless every stage succeeds.
pub fn run_pipeline(
    config: &Config,
    options: &RunOptions,
    provider: &dyn EmbeddingProvider,
) -> Result<RunReport> {
    let syllabus = loader::load_syllabus(&options.syllabus)?;
    let questions = load_questions(&options.source, &syllabus)?;
    let range = resolve_range(config, options.start_module, options.end_module, &syllabus)?;
    tracing::info!(range = %range, "module scope");

    let mapped = map_in_range(config, &syllabus, range, &questions, provider)?;
    let fallbacks = mapped
        .iter()
        .filter(|m| m.mapped_topics.first().is_some_and(|t| t.is_fallback()))
        .count();

    let split = filter_mapped_by_range(&mapped, range);
    if !split.out_of_range.is_empty() {
        tracing::warn!(
            count = split.out_of_range.len(),
            "questions mapped outside the module range were dropped"
        );
    }

    let engine = CanonicalEngine::new(provider, config.canonical.to_params());
    let canonical = engine.canonicalize(&split.in_range)?;

    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output.dir.clone());
    let (mapped_path, canonical_path) =
        write_outputs(&output_dir, &syllabus.course_code, &split.in_range, &canonical)?;

    Ok(RunReport {
        course_code: syllabus.course_code.clone(),
        range,
        questions: questions.len(),
        mapped: split.in_range.len(),
        out_of_range: split.out_of_range.len(),
        fallbacks,
        canonical_topics: canonical.len(),
        canonical_groups: canonical.total_groups(),
        mapped_path,
        canonical_path,
    })
}

fn write_outputs(
    dir: &Path,
    course_code: &str,
    mapped: &[MappedQuestion],
    canonical: &CanonicalOutput,
) -> Result<(PathBuf, PathBuf)> {
    let mapped_path = export::mapped_output_path(dir, course_code);
    let canonical_path = export::canonical_output_path(dir, course_code);
    let files = [
        (mapped_path.clone(), export::to_pretty_json(mapped)?),
        (canonical_path.clone(), export::to_pretty_json(canonical)?),
    ];
    export::write_all_or_nothing(&files)?;
    Ok((mapped_path, canonical_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use std::fs;
    use tempfile::TempDir;

    const SYLLABUS: &str = r#"{
        "course_code": "EC201",
        "course_title": "Digital Electronics",
        "modules": [
            {"module_id": 1, "module_name": "Combinational Circuits",
             "main_topics": [
                {"main_topic": "Adders", "sub_topics": ["Half Adder", "Full Adder"],
                 "desc": "half adder and full adder circuits built from logic gates"},
                {"main_topic": "Multiplexers", "sub_topics": ["Multiplexer"],
                 "desc": "multiplexer data selector circuits"}
             ]},
            {"module_id": 2, "module_name": "Sequential Circuits",
             "main_topics": [
                {"main_topic": "Counters", "sub_topics": ["Ripple Counter"],
                 "desc": "ripple counter and synchronous counter design"}
             ]}
        ]
    }"#;

    fn setup(paper_code: &str) -> (TempDir, RunOptions) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("syllabus.json"), SYLLABUS).unwrap();
        let papers = tmp.path().join("papers");
        fs::create_dir(&papers).unwrap();
        for (name, number) in [("p1.json", "1"), ("p2.json", "4")] {
            let body = serde_json::json!({
                "course_code": paper_code,
                "questions": [
                    {"question_number": number,
                     "question_text": "Explain the working of a half adder circuit",
                     "marks": 5},
                    {"question_number": "9",
                     "question_text": "Design a ripple counter", "marks": 10}
                ]
            });
            fs::write(papers.join(name), body.to_string()).unwrap();
        }
        let options = RunOptions {
            syllabus: tmp.path().join("syllabus.json"),
            source: QuestionSource::Papers(papers),
            start_module: None,
            end_module: None,
            output_dir: Some(tmp.path().join("out")),
        };
        (tmp, options)
    }

    #[test]
    fn test_run_writes_both_outputs() {
        let (tmp, options) = setup("EC201");
        let provider = HashProvider::new(256).unwrap();
        let report = run_pipeline(&Config::default(), &options, &provider).unwrap();

        assert_eq!(report.questions, 4);
        assert_eq!(report.mapped, 4);
        assert!(report.mapped_path.exists());
        assert!(report.canonical_path.exists());
        assert_eq!(
            report.mapped_path,
            tmp.path().join("out").join("mapped_questions_EC201.json")
        );

        let canonical: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report.canonical_path).unwrap()).unwrap();
        let adders = canonical["Adders"].as_array().unwrap();
        assert_eq!(adders[0]["occurrences"], 2);
        assert_eq!(
            adders[0]["references"],
            serde_json::json!(["p1.json - 1", "p2.json - 4"])
        );
    }

    #[test]
    fn test_subject_mismatch_writes_nothing() {
        let (tmp, options) = setup("MA101");
        let provider = HashProvider::new(256).unwrap();
        let err = run_pipeline(&Config::default(), &options, &provider).unwrap_err();
        assert!(err.to_string().contains("Subject mismatch"));
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn test_invalid_range_writes_nothing() {
        let (tmp, mut options) = setup("EC201");
        options.start_module = Some(1);
        options.end_module = Some(3);
        let provider = HashProvider::new(256).unwrap();
        assert!(run_pipeline(&Config::default(), &options, &provider).is_err());
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn test_failed_canonical_write_leaves_no_mapped_file() {
        let (tmp, options) = setup("EC201");
        let out = tmp.path().join("out");
        // A directory squatting on the canonical path cannot be replaced by a file.
        fs::create_dir_all(export::canonical_output_path(&out, "EC201")).unwrap();
        let provider = HashProvider::new(256).unwrap();

        assert!(run_pipeline(&Config::default(), &options, &provider).is_err());
        assert!(!export::mapped_output_path(&out, "EC201").exists());
        let leftovers: Vec<_> = fs::read_dir(&out)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("canonical_questions_EC201.json")]);
    }

    #[test]
    fn test_scoped_run_maps_only_into_range() {
        let (_tmp, mut options) = setup("EC201");
        options.start_module = Some(2);
        options.end_module = Some(2);
        let provider = HashProvider::new(256).unwrap();
        let report = run_pipeline(&Config::default(), &options, &provider).unwrap();

        let mapped: Vec<MappedQuestion> =
            serde_json::from_str(&fs::read_to_string(&report.mapped_path).unwrap()).unwrap();
        assert!(mapped
            .iter()
            .flat_map(|m| &m.mapped_topics)
            .all(|t| t.module_id == 2));
    }

    #[test]
    fn test_resolve_range_prefers_cli_over_config() {
        let syllabus: Syllabus = serde_json::from_str(SYLLABUS).unwrap();
        let mut config = Config::default();
        config.scope.start_module = Some(2);

        let range = resolve_range(&config, None, None, &syllabus).unwrap();
        assert_eq!((range.start(), range.end()), (2, 2));

        let range = resolve_range(&config, Some(1), None, &syllabus).unwrap();
        assert_eq!((range.start(), range.end()), (1, 2));
    }
}
