//! # qcanon
//!
//! Maps exam questions onto the topics of an enriched syllabus and extracts
//! canonical recurring questions per topic.
//!
//! The scoring and clustering logic lives in [`qcanon_core`]; this crate
//! supplies everything around it: configuration, embedding providers,
//! paper loading, the subject gate, and JSON output.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Syllabus   │──▶│ Subject gate│──▶│ TopicMapper  │──▶│CanonicalEngine│
//! │  + papers   │   │ + scope     │   │ (core)       │   │ (core)       │
//! └─────────────┘   └─────────────┘   └──────┬───────┘   └──────┬───────┘
//!                                            ▼                  ▼
//!                                  mapped_questions_*.json  canonical_questions_*.json
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qcanon modules --syllabus syllabus.json
//! qcanon run --syllabus syllabus.json --papers ./papers --output ./output
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding provider implementations |
//! | [`loader`] | Syllabus and paper loading, subject gate |
//! | [`run`] | Pipeline orchestration |
//! | [`export`] | JSON output |

pub mod config;
pub mod embedding;
pub mod export;
pub mod loader;
pub mod run;
