//! Text normalization, tokenization, and acronym handling.
//!
//! Question text arrives from OCR and LLM restructuring, so it carries
//! stray matrix rows, inconsistent casing, and initialisms that never
//! appear in the syllabus wording. These helpers bring questions and
//! topics into a shared form before scoring.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::SyllabusModule;

/// Uppercase initialism → the topic phrase it abbreviates.
pub type AcronymMap = BTreeMap<String, String>;

/// Words ignored by lexical scoring. Includes exam directive verbs
/// ("explain", "describe", ...) that carry no topical signal.
pub const STOPWORDS: &[&str] = &[
    "the", "is", "and", "of", "in", "to", "a", "for", "with", "on", "that", "as", "an", "are",
    "by", "be", "this", "using", "such", "how", "what", "which", "explain", "design", "discuss",
    "analyze", "compare", "describe",
];

const MATRIX_ROW_MIN_TOKENS: usize = 4;
const ACRONYM_MIN_LEN: usize = 2;
const ACRONYM_MAX_LEN: usize = 6;

/// Lowercase, drop numeric matrix rows, and collapse whitespace.
///
/// A line is a matrix row when it consists only of digits, `.`, `-` and
/// whitespace and splits into at least four tokens.
pub fn normalize_text(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !is_matrix_row(line))
        .collect();

    kept.join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_matrix_row(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || c == '.' || c == '-')
        && line.split_whitespace().count() >= MATRIX_ROW_MIN_TOKENS
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lexical tokens: lowercase, punctuation stripped, stopwords and tokens of
/// two characters or fewer removed, one trailing `s` dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .filter(|t| !STOPWORDS.contains(t) && t.chars().count() > 2)
        .map(|t| t.strip_suffix('s').unwrap_or(t).to_string())
        .collect()
}

/// [`tokenize`] collected into a set.
pub fn token_set(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

/// Build the acronym map for every topic and sub-topic phrase in `modules`.
///
/// Two sources feed the same map, later phrases overwriting earlier ones:
/// an explicit parenthetical such as `"Finite State Machine (FSM)"`, and
/// the initials of each run of two or more consecutive capitalized
/// alphabetic words. Only keys of 2 to 6 characters are kept.
pub fn extract_acronyms(modules: &[SyllabusModule]) -> AcronymMap {
    let mut map = AcronymMap::new();

    for module in modules {
        for topic in &module.main_topics {
            for phrase in topic.phrases() {
                if let Some(inner) = parenthetical(phrase) {
                    let acronym = inner.trim().to_uppercase();
                    if acronym_len_ok(&acronym) {
                        map.insert(acronym, phrase.to_string());
                    }
                }

                for initials in capitalized_runs(phrase) {
                    if acronym_len_ok(&initials) {
                        map.insert(initials, phrase.to_string());
                    }
                }
            }
        }
    }

    map
}

fn acronym_len_ok(acronym: &str) -> bool {
    (ACRONYM_MIN_LEN..=ACRONYM_MAX_LEN).contains(&acronym.chars().count())
}

/// Contents of the first non-empty `( ... )` group.
fn parenthetical(phrase: &str) -> Option<&str> {
    for (open, _) in phrase.match_indices('(') {
        let rest = &phrase[open + 1..];
        if let Some(close) = rest.find(')') {
            if close > 0 {
                return Some(&rest[..close]);
            }
        }
    }
    None
}

/// Initials of every maximal run of at least two capitalized words.
fn capitalized_runs(phrase: &str) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    let mut run_len = 0;

    let mut flush = |current: &mut String, run_len: &mut usize| {
        if *run_len >= 2 {
            runs.push(current.to_uppercase());
        }
        current.clear();
        *run_len = 0;
    };

    for word in phrase.split_whitespace() {
        let capitalized = word.chars().next().is_some_and(char::is_uppercase)
            && word.chars().all(char::is_alphabetic);
        if capitalized {
            if let Some(first) = word.chars().next() {
                current.push(first);
                run_len += 1;
            }
        } else {
            flush(&mut current, &mut run_len);
        }
    }
    flush(&mut current, &mut run_len);

    runs
}

/// Append `(<expansion>)` after every token that is a known acronym.
///
/// The original token is kept; a token matches when, stripped of
/// punctuation and uppercased, it is a key of `acronyms`.
pub fn expand_acronyms(text: &str, acronyms: &AcronymMap) -> String {
    text.split_whitespace()
        .map(|word| {
            let key: String = word.chars().filter(|c| is_word_char(*c)).collect();
            match acronyms.get(&key.to_uppercase()) {
                Some(full) => format!("{} ({})", word, full),
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
