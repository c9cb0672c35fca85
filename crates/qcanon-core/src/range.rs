//! Module-range scoping.
//!
//! A run may be restricted to an inclusive range of module ids, for example
//! the modules covered by a mid-term exam. The range narrows the syllabus
//! before mapping and filters mapped questions afterwards.

use std::fmt;

use crate::error::{CoreError, Result};
use crate::models::{MappedQuestion, SyllabusModule};

/// Inclusive, validated module id range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleRange {
    start: i64,
    end: i64,
}

impl ModuleRange {
    /// Validate `start..=end` against the highest module id in the syllabus.
    pub fn new(start: i64, end: i64, max_valid_module: i64) -> Result<Self> {
        if start < 1 {
            return Err(CoreError::InvalidRange(format!(
                "start module must be >= 1, got {}",
                start
            )));
        }
        if end > max_valid_module {
            return Err(CoreError::InvalidRange(format!(
                "end module must be <= {}, got {}",
                max_valid_module, end
            )));
        }
        if start > end {
            return Err(CoreError::InvalidRange(format!(
                "start module {} is greater than end module {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn contains(&self, module_id: i64) -> bool {
        (self.start..=self.end).contains(&module_id)
    }
}

impl fmt::Display for ModuleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Syllabus modules whose id lies in `range`, in syllabus order.
pub fn filter_modules(
    modules: &[SyllabusModule],
    range: ModuleRange,
) -> Result<Vec<SyllabusModule>> {
    let selected: Vec<SyllabusModule> = modules
        .iter()
        .filter(|m| range.contains(m.module_id))
        .cloned()
        .collect();

    if selected.is_empty() {
        return Err(CoreError::MissingInput(format!(
            "no modules found in range {}",
            range
        )));
    }
    Ok(selected)
}

/// Mapped questions split by a module range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeSplit {
    /// Questions with at least one in-range topic, restricted to those topics.
    pub in_range: Vec<MappedQuestion>,
    /// Questions whose topics all fall outside the range, unchanged.
    pub out_of_range: Vec<MappedQuestion>,
}

/// Split mapped questions by `range`. Questions with no topics at all are
/// in neither list. Allocated marks of kept topics are left as mapped.
pub fn filter_mapped_by_range(mapped: &[MappedQuestion], range: ModuleRange) -> RangeSplit {
    let mut split = RangeSplit::default();

    for mq in mapped {
        let in_range: Vec<_> = mq
            .mapped_topics
            .iter()
            .filter(|t| range.contains(t.module_id))
            .cloned()
            .collect();

        if !in_range.is_empty() {
            split.in_range.push(MappedQuestion {
                question: mq.question.clone(),
                mapped_topics: in_range,
            });
        } else if !mq.mapped_topics.is_empty() {
            split.out_of_range.push(mq.clone());
        }
    }

    split
}
