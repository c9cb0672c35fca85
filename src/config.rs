//! TOML configuration.
//!
//! Every section is optional and every field has a default, so a partial
//! file (or no file at all) yields the stock mapping and clustering
//! behaviour. See `config/qcanon.example.toml` for a full example.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use qcanon_core::params::{CanonicalParams, MappingParams};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    #[serde(default)]
    pub canonical: CanonicalConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct MappingConfig {
    #[serde(default = "default_module_margin")]
    pub module_margin: f32,
    #[serde(default = "default_topic_margin")]
    pub topic_margin: f64,
    #[serde(default = "default_min_semantic_floor")]
    pub min_semantic_floor: f32,
    #[serde(default = "default_max_topics")]
    pub max_topics_per_question: usize,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    #[serde(default = "default_concept_weight")]
    pub concept_weight: f64,
    #[serde(default = "default_fuzzy_weight")]
    pub fuzzy_weight: f64,
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        let p = MappingParams::default();
        Self {
            module_margin: p.module_margin,
            topic_margin: p.topic_margin,
            min_semantic_floor: p.min_semantic_floor,
            max_topics_per_question: p.max_topics_per_question,
            semantic_weight: p.semantic_weight,
            concept_weight: p.concept_weight,
            fuzzy_weight: p.fuzzy_weight,
            fallback_confidence: p.fallback_confidence,
        }
    }
}

fn default_module_margin() -> f32 {
    MappingParams::default().module_margin
}
fn default_topic_margin() -> f64 {
    MappingParams::default().topic_margin
}
fn default_min_semantic_floor() -> f32 {
    MappingParams::default().min_semantic_floor
}
fn default_max_topics() -> usize {
    MappingParams::default().max_topics_per_question
}
fn default_semantic_weight() -> f64 {
    MappingParams::default().semantic_weight
}
fn default_concept_weight() -> f64 {
    MappingParams::default().concept_weight
}
fn default_fuzzy_weight() -> f64 {
    MappingParams::default().fuzzy_weight
}
fn default_fallback_confidence() -> f64 {
    MappingParams::default().fallback_confidence
}

impl MappingConfig {
    pub fn to_params(&self) -> MappingParams {
        MappingParams {
            module_margin: self.module_margin,
            topic_margin: self.topic_margin,
            min_semantic_floor: self.min_semantic_floor,
            max_topics_per_question: self.max_topics_per_question,
            semantic_weight: self.semantic_weight,
            concept_weight: self.concept_weight,
            fuzzy_weight: self.fuzzy_weight,
            fallback_confidence: self.fallback_confidence,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CanonicalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for CanonicalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    CanonicalParams::default().similarity_threshold
}

impl CanonicalConfig {
    pub fn to_params(&self) -> CanonicalParams {
        CanonicalParams {
            similarity_threshold: self.similarity_threshold,
        }
    }
}

/// Optional inclusive module range applied to every run.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScopeConfig {
    pub start_module: Option<i64>,
    pub end_module: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let m = &self.mapping;

        // Validate mapping
        for (name, value) in [
            ("mapping.module_margin", m.module_margin as f64),
            ("mapping.topic_margin", m.topic_margin),
            ("mapping.min_semantic_floor", m.min_semantic_floor as f64),
            ("mapping.fallback_confidence", m.fallback_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be in [0.0, 1.0], got {}", name, value);
            }
        }

        if m.max_topics_per_question < 1 {
            bail!("mapping.max_topics_per_question must be >= 1");
        }

        if m.semantic_weight < 0.0 || m.concept_weight < 0.0 || m.fuzzy_weight < 0.0 {
            bail!("mapping weights must be non-negative");
        }
        let weight_sum = m.semantic_weight + m.concept_weight + m.fuzzy_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            bail!("mapping weights must sum to 1.0, got {}", weight_sum);
        }

        // Validate canonical
        let t = self.canonical.similarity_threshold;
        if !(t > 0.0 && t <= 1.0) {
            bail!("canonical.similarity_threshold must be in (0.0, 1.0], got {}", t);
        }

        // Validate scope
        if let (Some(start), Some(end)) = (self.scope.start_module, self.scope.end_module) {
            if start > end {
                bail!(
                    "scope.start_module ({}) is greater than scope.end_module ({})",
                    start,
                    end
                );
            }
        }

        // Validate embedding
        let e = &self.embedding;
        if e.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }
        match e.provider.as_str() {
            "disabled" | "hash" | "local" => {}
            "openai" | "ollama" => {
                if e.dims.is_none() || e.dims == Some(0) {
                    bail!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        e.provider
                    );
                }
                if e.model.is_none() {
                    bail!(
                        "embedding.model must be specified when provider is '{}'",
                        e.provider
                    );
                }
            }
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, hash, local, openai, or ollama.",
                other
            ),
        }
        if e.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.mapping.to_params(), MappingParams::default());
        assert_eq!(config.canonical.to_params(), CanonicalParams::default());
        assert_eq!(config.output.dir, PathBuf::from("./output"));
        assert!(config.scope.start_module.is_none());
    }

    #[test]
    fn test_partial_mapping_section() {
        let config = parse("[mapping]\ntopic_margin = 0.05\n").unwrap();
        assert_eq!(config.mapping.topic_margin, 0.05);
        assert_eq!(config.mapping.max_topics_per_question, 4);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let err = parse("[mapping]\nsemantic_weight = 0.7\n").unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = parse("[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_remote_provider_requires_model_and_dims() {
        assert!(parse("[embedding]\nprovider = \"openai\"\ndims = 1536\n").is_err());
        assert!(
            parse("[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n").is_err()
        );
        assert!(parse(
            "[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n"
        )
        .is_ok());
    }

    #[test]
    fn test_scope_order_checked() {
        assert!(parse("[scope]\nstart_module = 3\nend_module = 2\n").is_err());
        let config = parse("[scope]\nstart_module = 2\nend_module = 3\n").unwrap();
        assert_eq!(config.scope.end_module, Some(3));
    }

    #[test]
    fn test_similarity_threshold_range() {
        assert!(parse("[canonical]\nsimilarity_threshold = 0.0\n").is_err());
        assert!(parse("[canonical]\nsimilarity_threshold = 1.0\n").is_ok());
    }
}
