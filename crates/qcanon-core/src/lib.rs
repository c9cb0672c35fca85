//! # qcanon core
//!
//! Pure, synchronous logic for qcanon: the exam-question data model,
//! syllabus topic mapping, and canonical question clustering.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. Every component
//! that needs embeddings receives an [`embedding::EmbeddingProvider`] from
//! the host; nothing here loads a model on its own.
//!
//! ```text
//! questions + syllabus
//!        │
//!        ▼
//! ┌──────────────┐   ┌────────────────┐   ┌────────────────┐
//! │ TopicMapper  │──▶│ MappedQuestion │──▶│ CanonicalEngine│──▶ CanonicalOutput
//! │ module+topic │   │ (marks split)  │   │ avg-linkage +  │
//! │ selection    │   └────────────────┘   │ medoid         │
//! └──────────────┘                        └────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Questions, syllabus, mapped questions, canonical groups |
//! | [`embedding`] | Embedding provider trait and vector helpers |
//! | [`text`] | Normalization, tokenization, acronym handling |
//! | [`fuzzy`] | Token-set fuzzy ratio |
//! | [`module_select`] | Margin-band module selection |
//! | [`topic_select`] | Blended semantic/lexical/fuzzy topic selection |
//! | [`pipeline`] | Per-question topic assignment and mark allocation |
//! | [`cluster`] | Average-linkage clustering and medoids |
//! | [`canonical`] | Canonical question extraction per topic |
//! | [`range`] | Module-range scoping |
//! | [`stub`] | Fixed-output embedding provider for tests |

pub mod canonical;
pub mod cluster;
pub mod embedding;
pub mod error;
pub mod fuzzy;
pub mod models;
pub mod module_select;
pub mod params;
pub mod pipeline;
pub mod range;
pub mod stub;
pub mod text;
pub mod topic_select;

pub use error::{CoreError, Result};
