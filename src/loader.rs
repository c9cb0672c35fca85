//! Input loading: enriched syllabus, paper files, and the subject gate.
//!
//! Paper files are the per-paper JSON documents produced by the upstream
//! extraction stage. Each holds a course code and a list of questions, some
//! of which are split into labelled sub-questions:
//!
//! ```json
//! {
//!   "course_code": "EC201",
//!   "questions": [
//!     {"question_number": "1", "question_text": "...", "marks": 10,
//!      "sub_questions": [{"sub_question_label": "a", "text": "...", "marks": 5}]}
//!   ]
//! }
//! ```
//!
//! Sub-questions with text become independent questions numbered
//! `"<number>_<label>"`; otherwise the parent question stands alone.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use qcanon_core::models::{Question, Syllabus};

/// One exam paper as read from disk.
#[derive(Debug, Clone)]
pub struct Paper {
    /// File name, used as `paper_name` on every question.
    pub name: String,
    pub course_code: String,
    pub questions: Vec<RawQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
struct PaperFile {
    #[serde(default)]
    course_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawQuestion {
    #[serde(default, deserialize_with = "string_or_number")]
    pub question_number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question_text: String,
    #[serde(default)]
    pub marks: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_questions: Vec<RawSubQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSubQuestion {
    #[serde(default, deserialize_with = "string_or_number")]
    pub sub_question_label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default)]
    pub marks: Option<f64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Question numbers and labels show up both as `"3"` and `3`.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Load an enriched syllabus and drop modules without topics.
pub fn load_syllabus(path: &Path) -> Result<Syllabus> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read syllabus file: {}", path.display()))?;
    let syllabus: Syllabus = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse syllabus file: {}", path.display()))?;

    let total = syllabus.modules.len();
    let syllabus = syllabus
        .into_effective()
        .with_context(|| format!("Invalid syllabus: {}", path.display()))?;

    tracing::info!(
        course = %syllabus.course_code,
        modules = syllabus.modules.len(),
        dropped = total - syllabus.modules.len(),
        "syllabus loaded"
    );
    Ok(syllabus)
}

/// Every `*.json` file directly inside `dir`, sorted by file name.
pub fn paper_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Papers directory not found: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|e| e == "json") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();

    if files.is_empty() {
        bail!("No paper JSON files found in {}", dir.display());
    }
    Ok(files)
}

/// Load one paper file.
pub fn load_paper(path: &Path) -> Result<Paper> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read paper file: {}", path.display()))?;
    let file: PaperFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse paper file: {}", path.display()))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Paper {
        name,
        course_code: file.course_code,
        questions: file.questions,
    })
}

/// Load every paper in `dir`.
pub fn load_papers(dir: &Path) -> Result<Vec<Paper>> {
    let papers = paper_files(dir)?
        .iter()
        .map(|p| load_paper(p))
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(papers = papers.len(), dir = %dir.display(), "papers loaded");
    Ok(papers)
}

/// Reject the run if any paper belongs to a different course.
///
/// Codes are compared trimmed and case-insensitively. Every mismatching
/// paper is listed in the error.
pub fn check_subject(papers: &[Paper], syllabus_course_code: &str) -> Result<()> {
    let expected = syllabus_course_code.trim().to_uppercase();

    let mismatches: Vec<String> = papers
        .iter()
        .filter(|p| p.course_code.trim().to_uppercase() != expected)
        .map(|p| format!("{} (found '{}')", p.name, p.course_code.trim()))
        .collect();

    if !mismatches.is_empty() {
        bail!(
            "Subject mismatch: {} paper(s) do not match syllabus course {}: {}",
            mismatches.len(),
            expected,
            mismatches.join(", ")
        );
    }

    tracing::info!(course = %expected, papers = papers.len(), "subject check passed");
    Ok(())
}

/// Flatten papers into questions, splitting out sub-questions.
pub fn unify_questions(papers: &[Paper]) -> Vec<Question> {
    let mut questions = Vec::new();

    for paper in papers {
        for q in &paper.questions {
            let number = q.question_number.trim();
            let subs: Vec<&RawSubQuestion> = q
                .sub_questions
                .iter()
                .filter(|s| !s.text.trim().is_empty())
                .collect();

            if subs.is_empty() {
                if q.question_text.trim().is_empty() {
                    tracing::warn!(paper = %paper.name, number, "skipping question with no text");
                    continue;
                }
                questions.push(Question {
                    paper_name: paper.name.clone(),
                    question_number: number.to_string(),
                    text: q.question_text.trim().to_string(),
                    marks: q.marks.unwrap_or(0.0),
                });
            } else {
                for sub in subs {
                    questions.push(Question {
                        paper_name: paper.name.clone(),
                        question_number: format!("{}_{}", number, sub.sub_question_label.trim()),
                        text: sub.text.trim().to_string(),
                        marks: sub.marks.unwrap_or(0.0),
                    });
                }
            }
        }
    }

    questions
}

/// Load a pre-unified JSON array of questions.
pub fn load_questions_file(path: &Path) -> Result<Vec<Question>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read questions file: {}", path.display()))?;
    let questions: Vec<Question> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse questions file: {}", path.display()))?;
    Ok(questions)
}
