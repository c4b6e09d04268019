//! Deterministic keyword rule engine.
//!
//! Maps a [`NormalizedText`] to a priority, category, and sentiment using
//! an immutable [`RuleSet`]. Every decision can be traced back to the terms
//! that fired, which is the point of using rules instead of a model.
//!
//! # Precedence
//!
//! - Priority: any high term → High, else any medium term → Medium, else Low.
//! - Category: most matching terms wins; ties go to the first declared category.
//! - Sentiment: negative terms beat positive terms.
//!
//! All matching is case-insensitive substring matching against the cleaned
//! sentence, so `"crash"` fires on `"crashed"`.

use serde::{Deserialize, Serialize};

use crate::models::{ClassificationResult, Priority, Sentiment};
use crate::normalize::NormalizedText;

/// A named category and the terms that vote for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub terms: Vec<String>,
}

/// Keyword lists and confidences for the classifier.
///
/// Loaded once from the `[classifier]` config section. The built-in
/// defaults are samples and are expected to be replaced per deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub high_priority_terms: Vec<String>,
    pub medium_priority_terms: Vec<String>,
    pub categories: Vec<CategoryRule>,
    pub negative_terms: Vec<String>,
    pub positive_terms: Vec<String>,
    pub default_category: String,
    pub high_confidence: f64,
    pub medium_confidence: f64,
    pub low_confidence: f64,
}

fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            high_priority_terms: terms(&[
                "error",
                "failed",
                "urgent",
                "critical",
                "not working",
                "crash",
                "down",
                "issue immediately",
                "broken",
                "emergency",
                "asap",
            ]),
            medium_priority_terms: terms(&[
                "delay",
                "problem",
                "help",
                "trouble",
                "stuck",
                "confusion",
                "question",
                "issue",
                "bug",
                "slow",
                "difficulty",
            ]),
            categories: vec![
                CategoryRule {
                    name: "Technical Issue".to_string(),
                    terms: terms(&["error", "bug", "crash", "not working", "failed", "broken"]),
                },
                CategoryRule {
                    name: "Account Problem".to_string(),
                    terms: terms(&["login", "password", "account", "access", "authentication"]),
                },
                CategoryRule {
                    name: "Billing Question".to_string(),
                    terms: terms(&["payment", "billing", "invoice", "charge", "refund", "cost"]),
                },
                CategoryRule {
                    name: "Feature Request".to_string(),
                    terms: terms(&["feature", "enhancement", "improvement", "suggestion"]),
                },
                CategoryRule {
                    name: "General Inquiry".to_string(),
                    terms: terms(&["question", "information", "inquiry"]),
                },
            ],
            negative_terms: terms(&[
                "bad",
                "terrible",
                "awful",
                "hate",
                "angry",
                "frustrated",
                "disappointed",
                "annoyed",
                "upset",
                "wrong",
                "broken",
                "failed",
            ]),
            positive_terms: terms(&[
                "good",
                "great",
                "excellent",
                "amazing",
                "wonderful",
                "perfect",
                "love",
                "satisfied",
                "happy",
                "pleased",
                "thank",
            ]),
            default_category: "General".to_string(),
            high_confidence: 0.90,
            medium_confidence: 0.80,
            low_confidence: 0.70,
        }
    }
}

/// Rule engine over a lowercased copy of a [`RuleSet`].
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: RuleSet,
}

impl KeywordClassifier {
    pub fn new(rules: RuleSet) -> Self {
        let lower = |v: Vec<String>| -> Vec<String> {
            let mut out: Vec<String> = Vec::with_capacity(v.len());
            for t in v {
                let t = t.trim().to_lowercase();
                if !t.is_empty() && !out.contains(&t) {
                    out.push(t);
                }
            }
            out
        };

        let rules = RuleSet {
            high_priority_terms: lower(rules.high_priority_terms),
            medium_priority_terms: lower(rules.medium_priority_terms),
            categories: rules
                .categories
                .into_iter()
                .map(|c| CategoryRule {
                    name: c.name,
                    terms: lower(c.terms),
                })
                .collect(),
            negative_terms: lower(rules.negative_terms),
            positive_terms: lower(rules.positive_terms),
            ..rules
        };

        Self { rules }
    }

    pub fn classify(&self, text: &NormalizedText) -> ClassificationResult {
        let haystack = text.cleaned.to_lowercase();

        let high = matches(&self.rules.high_priority_terms, &haystack);
        let (priority, confidence, matched_keywords) = if !high.is_empty() {
            (Priority::High, self.rules.high_confidence, high)
        } else {
            let medium = matches(&self.rules.medium_priority_terms, &haystack);
            if !medium.is_empty() {
                (Priority::Medium, self.rules.medium_confidence, medium)
            } else {
                (Priority::Low, self.rules.low_confidence, Vec::new())
            }
        };

        ClassificationResult {
            priority,
            category: self.category(&haystack),
            sentiment: self.sentiment(&haystack),
            matched_keywords,
            confidence,
        }
    }

    fn category(&self, haystack: &str) -> String {
        let mut best: Option<(&str, usize)> = None;
        for rule in &self.rules.categories {
            let score = rule.terms.iter().filter(|t| haystack.contains(t.as_str())).count();
            // Strictly greater keeps the first declared category on ties.
            if score > 0 && best.map_or(true, |(_, b)| score > b) {
                best = Some((&rule.name, score));
            }
        }
        best.map(|(name, _)| name.to_string())
            .unwrap_or_else(|| self.rules.default_category.clone())
    }

    fn sentiment(&self, haystack: &str) -> Sentiment {
        if self.rules.negative_terms.iter().any(|t| haystack.contains(t.as_str())) {
            Sentiment::Negative
        } else if self.rules.positive_terms.iter().any(|t| haystack.contains(t.as_str())) {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}

fn matches(terms: &[String], haystack: &str) -> Vec<String> {
    terms
        .iter()
        .filter(|t| haystack.contains(t.as_str()))
        .cloned()
        .collect()
}
