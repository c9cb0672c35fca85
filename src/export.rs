//! JSON output for mapped and canonical questions.
//!
//! Both files are pretty-printed JSON named after the course code:
//! `mapped_questions_<course>.json` holds the mapped question list and
//! `canonical_questions_<course>.json` the per-topic canonical groups.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Course code reduced to characters that are safe in a file name.
fn file_stem(course_code: &str) -> String {
    course_code
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

pub fn mapped_output_path(dir: &Path, course_code: &str) -> PathBuf {
    dir.join(format!("mapped_questions_{}.json", file_stem(course_code)))
}

pub fn canonical_output_path(dir: &Path, course_code: &str) -> PathBuf {
    dir.join(format!("canonical_questions_{}.json", file_stem(course_code)))
}

pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory: {}", parent.display())
            })?;
        }
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` as pretty JSON.
///
/// If `output` is `Some`, writes to that file path (creating parent
/// directories). Otherwise writes to stdout for piping.
pub fn write_json<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = to_pretty_json(value)?;

    match output {
        Some(path) => {
            create_parent_dir(path)?;
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = json.len(), "wrote output");
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

/// Write every `(path, contents)` pair, or none of them.
///
/// Each file is first written to a `.tmp` sibling. Targets are renamed into
/// place only after every temp file is on disk. If a rename fails, the
/// targets already renamed are removed along with the remaining temp files.
pub fn write_all_or_nothing(files: &[(PathBuf, String)]) -> Result<()> {
    let temps: Vec<PathBuf> = files.iter().map(|(path, _)| temp_path(path)).collect();

    let staged = files.iter().zip(&temps).try_for_each(|((path, json), temp)| {
        create_parent_dir(path)?;
        std::fs::write(temp, json).with_context(|| format!("Failed to write {}", temp.display()))
    });
    if let Err(e) = staged {
        for temp in &temps {
            let _ = std::fs::remove_file(temp);
        }
        return Err(e);
    }

    for (i, ((path, json), temp)) in files.iter().zip(&temps).enumerate() {
        if let Err(e) = std::fs::rename(temp, path) {
            for (done, _) in &files[..i] {
                let _ = std::fs::remove_file(done);
            }
            for pending in &temps[i..] {
                let _ = std::fs::remove_file(pending);
            }
            return Err(e).with_context(|| format!("Failed to write {}", path.display()));
        }
        tracing::info!(path = %path.display(), bytes = json.len(), "wrote output");
    }

    Ok(())
}
