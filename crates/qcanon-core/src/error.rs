use thiserror::Error;

/// Fatal conditions that abort a mapping or clustering run.
///
/// A question that clears no topic floor, or a topic with fewer than two
/// questions, is not an error: the first resolves to the module-level
/// fallback and the second is skipped.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The syllabus (or a scoped subset of it) has nothing to map against.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// The embedding provider failed or returned an unusable batch.
    #[error("embedding oracle failed: {0}")]
    OracleFailure(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// A requested module range falls outside the syllabus.
    #[error("invalid module range: {0}")]
    InvalidRange(String),
}

impl CoreError {
    pub(crate) fn oracle(err: anyhow::Error) -> Self {
        CoreError::OracleFailure(err.into())
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
