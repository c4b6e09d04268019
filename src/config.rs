//! TOML configuration parsing and validation.
//!
//! Every section is optional. A missing file on the command line means
//! "use the defaults", so `Config::default()` is a complete, valid
//! configuration backed by the offline `hashing` embedder.
//!
//! ```toml
//! [embedding]
//! provider = "hashing"
//! dims = 384
//!
//! [retrieval]
//! metric = "cosine"
//! top_n = 3
//!
//! [topics]
//! max_topics = 8
//! ```
//!
//! See `config/triage.example.toml` for every field.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use ticket_triage_core::classify::RuleSet;
use ticket_triage_core::index::Metric;
use ticket_triage_core::rank::RankParams;
use ticket_triage_core::topics::TopicParams;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub classifier: RuleSet,
    pub topics: TopicsConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `hashing`, `local`, or `disabled`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Inputs are truncated to this many tokens before embedding.
    #[serde(default = "default_max_seq_length")]
    pub max_seq_length: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            max_seq_length: default_max_seq_length(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_provider() -> String {
    "hashing".to_string()
}
fn default_max_seq_length() -> usize {
    256
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub metric: Metric,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_candidate_factor")]
    pub candidate_factor: usize,
    #[serde(default = "default_category_boost")]
    pub category_boost: f64,
    #[serde(default = "default_preview_len")]
    pub preview_len: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            metric: Metric::default(),
            top_n: default_top_n(),
            candidate_factor: default_candidate_factor(),
            category_boost: default_category_boost(),
            preview_len: default_preview_len(),
        }
    }
}

fn default_top_n() -> usize {
    3
}
fn default_candidate_factor() -> usize {
    2
}
fn default_category_boost() -> f64 {
    0.15
}
fn default_preview_len() -> usize {
    5
}

impl RetrievalConfig {
    pub fn rank_params(&self) -> RankParams {
        RankParams {
            limit: self.top_n,
            candidate_factor: self.candidate_factor,
            category_boost: self.category_boost,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TopicsConfig {
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,
    #[serde(default = "default_min_topic_size")]
    pub min_topic_size: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_keywords_per_topic")]
    pub keywords_per_topic: usize,
    /// Most recent tickets kept for topic runs; older ones are evicted.
    #[serde(default = "default_corpus_capacity")]
    pub corpus_capacity: usize,
    /// Share of the corpus below which a topic is reported as a content gap.
    #[serde(default = "default_gap_threshold")]
    pub gap_threshold: f64,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            max_topics: default_max_topics(),
            min_topic_size: default_min_topic_size(),
            max_iterations: default_max_iterations(),
            keywords_per_topic: default_keywords_per_topic(),
            corpus_capacity: default_corpus_capacity(),
            gap_threshold: default_gap_threshold(),
        }
    }
}

fn default_max_topics() -> usize {
    8
}
fn default_min_topic_size() -> usize {
    2
}
fn default_max_iterations() -> usize {
    50
}
fn default_keywords_per_topic() -> usize {
    5
}
fn default_corpus_capacity() -> usize {
    10_000
}
fn default_gap_threshold() -> f64 {
    0.05
}

impl TopicsConfig {
    pub fn topic_params(&self) -> TopicParams {
        TopicParams {
            max_topics: self.max_topics,
            min_topic_size: self.min_topic_size,
            max_iterations: self.max_iterations,
            keywords_per_topic: self.keywords_per_topic,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    #[serde(default = "default_top_n_usage")]
    pub top_articles: usize,
    #[serde(default = "default_top_n_usage")]
    pub top_languages: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_articles: default_top_n_usage(),
            top_languages: default_top_n_usage(),
        }
    }
}

fn default_top_n_usage() -> usize {
    10
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Embedding
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.max_seq_length == 0 {
        bail!("embedding.max_seq_length must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Retrieval
    let retrieval = &config.retrieval;
    if retrieval.top_n < 1 {
        bail!("retrieval.top_n must be >= 1");
    }
    if retrieval.candidate_factor < 1 {
        bail!("retrieval.candidate_factor must be >= 1");
    }
    if !retrieval.category_boost.is_finite() || retrieval.category_boost < 0.0 {
        bail!("retrieval.category_boost must be >= 0.0");
    }

    // Classifier
    let rules = &config.classifier;
    for (name, value) in [
        ("high_confidence", rules.high_confidence),
        ("medium_confidence", rules.medium_confidence),
        ("low_confidence", rules.low_confidence),
    ] {
        if !(0.0..=1.0).contains(&value) {
            bail!("classifier.{} must be in [0.0, 1.0]", name);
        }
    }
    if rules.default_category.trim().is_empty() {
        bail!("classifier.default_category must not be empty");
    }
    if let Some(pos) = rules.categories.iter().position(|c| c.name.trim().is_empty()) {
        bail!("classifier.categories[{}].name must not be empty", pos);
    }

    // Topics
    let topics = &config.topics;
    if topics.max_topics < 1 {
        bail!("topics.max_topics must be >= 1");
    }
    if topics.min_topic_size < 1 {
        bail!("topics.min_topic_size must be >= 1");
    }
    if topics.max_iterations < 1 {
        bail!("topics.max_iterations must be >= 1");
    }
    if topics.corpus_capacity < 1 {
        bail!("topics.corpus_capacity must be >= 1");
    }
    if !(topics.gap_threshold > 0.0 && topics.gap_threshold <= 1.0) {
        bail!("topics.gap_threshold must be in (0.0, 1.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.embedding.provider, "hashing");
        assert_eq!(cfg.retrieval.top_n, 3);
        assert_eq!(cfg.retrieval.metric, Metric::Cosine);
        assert_eq!(cfg.classifier.high_confidence, 0.90);
        assert_eq!(cfg.topics.corpus_capacity, 10_000);
        assert_eq!(cfg.analytics.top_articles, 10);
    }

    #[test]
    fn test_partial_sections() {
        let cfg = parse_config(
            r#"
[embedding]
dims = 64

[retrieval]
metric = "l2"
category_boost = 0.3

[[classifier.categories]]
name = "Shipping"
terms = ["parcel", "courier"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.embedding.dims, Some(64));
        assert_eq!(cfg.embedding.max_seq_length, 256);
        assert_eq!(cfg.retrieval.metric, Metric::L2);
        assert_eq!(cfg.retrieval.rank_params().category_boost, 0.3);
        assert_eq!(cfg.classifier.categories.len(), 1);
        assert_eq!(cfg.classifier.categories[0].name, "Shipping");
        // Unlisted classifier fields keep their defaults.
        assert!(!cfg.classifier.high_priority_terms.is_empty());
    }

    #[test]
    fn test_rejects_invalid_values() {
        for (doc, field) in [
            ("[embedding]\ndims = 0", "embedding.dims"),
            ("[retrieval]\ntop_n = 0", "retrieval.top_n"),
            ("[retrieval]\ncategory_boost = -1.0", "retrieval.category_boost"),
            ("[classifier]\nhigh_confidence = 1.5", "classifier.high_confidence"),
            ("[topics]\nmax_topics = 0", "topics.max_topics"),
            ("[topics]\ngap_threshold = 0.0", "topics.gap_threshold"),
        ] {
            let err = parse_config(doc).unwrap_err().to_string();
            assert!(err.contains(field), "{} -> {}", doc, err);
        }
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let cfg = parse_config(include_str!("../config/triage.example.toml")).unwrap();
        assert_eq!(cfg.classifier, RuleSet::default());
        assert_eq!(cfg.retrieval.top_n, RetrievalConfig::default().top_n);
        assert_eq!(cfg.topics.corpus_capacity, TopicsConfig::default().corpus_capacity);
    }

    #[test]
    fn test_unknown_metric_is_parse_error() {
        assert!(parse_config("[retrieval]\nmetric = \"manhattan\"").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/triage.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
