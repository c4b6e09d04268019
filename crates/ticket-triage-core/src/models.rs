//! Core data models used throughout Ticket Triage.
//!
//! These types represent the tickets, articles, classifications, and
//! analysis records that flow through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An incoming support ticket.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: Uuid,
    pub raw_text: String,
    pub source: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(raw_text: impl Into<String>, source: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_text: raw_text.into(),
            source: source.map(str::to_string),
            received_at: Utc::now(),
        }
    }
}

/// Ticket priority tier. Declaration order is the precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// Detected language of a ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageTag {
    /// ISO 639-1 code (e.g. `"en"`).
    pub code: String,
    /// Display name (e.g. `"English"`).
    pub name: String,
    pub confidence: f64,
}

/// Descriptor of the loaded embedding model. Diagnostics only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub dimension: usize,
    pub max_seq_length: usize,
}

/// A knowledge-base article with its embedding, as held by the index.
#[derive(Debug, Clone)]
pub struct KnowledgeArticle {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Declared category, used for the ranker's category boost.
    pub category: Option<String>,
    pub embedding: Vec<f32>,
}

/// Output of the keyword rule engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub priority: Priority,
    pub category: String,
    pub sentiment: Sentiment,
    /// Terms of the tier that fired, in rule declaration order.
    pub matched_keywords: Vec<String>,
    pub confidence: f64,
}

/// A ranked knowledge-base recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestedArticle {
    pub article_id: String,
    pub title: String,
    pub score: f64,
    #[serde(skip)]
    pub distance: f32,
    #[serde(skip)]
    pub category_match: bool,
}

/// Recommendations for a query text, without a full analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendations {
    pub recommendations: Vec<SuggestedArticle>,
    /// Normalized query that was embedded.
    pub query_text: String,
    pub total_results: usize,
}

/// Nearest topic of the latest topic run for an analysed ticket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicAssignment {
    pub topic_id: usize,
    pub keywords: Vec<String>,
    pub similarity: f64,
}

/// Full analysis record returned for one ticket.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub ticket_id: Uuid,
    pub source: Option<String>,
    pub received_at: DateTime<Utc>,
    pub priority: Priority,
    pub category: String,
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub language: LanguageTag,
    pub detected_keywords: Vec<String>,
    pub suggested_articles: Vec<SuggestedArticle>,
    pub embedding_preview: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<TopicAssignment>,
    pub processing_time_ms: f64,
    pub model_info: ModelInfo,
}
