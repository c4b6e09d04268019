//! Knowledge-base catalog loading.
//!
//! A catalog is a JSON array of articles:
//!
//! ```json
//! [
//!   {"id": "kb-1", "title": "Reset your password", "body": "Go to ...", "category": "Account Problem"},
//!   {"id": 2, "title": "Update billing details", "answer": "Open Billing ..."}
//! ]
//! ```
//!
//! Numeric ids are accepted and converted to strings, and `answer` is
//! accepted as an alias for `body`. Entries with neither a title nor a
//! body carry nothing to embed and are skipped.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// An article as supplied to `rebuild_knowledge_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleInput {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "answer")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ArticleInput {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Title and body joined, as embedded and classified.
    pub fn text(&self) -> String {
        match (self.title.trim(), self.body.trim()) {
            ("", body) => body.to_string(),
            (title, "") => title.to_string(),
            (title, body) => format!("{}. {}", title, body),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

/// Parse a catalog document.
pub fn parse_catalog(content: &str) -> Result<Vec<ArticleInput>> {
    let entries: Vec<ArticleInput> =
        serde_json::from_str(content).with_context(|| "Failed to parse knowledge base catalog")?;
    let total = entries.len();
    let articles: Vec<ArticleInput> = entries
        .into_iter()
        .filter(|a| {
            let keep = !a.text().is_empty();
            if !keep {
                warn!(id = %a.id, "skipping knowledge base entry without title or body");
            }
            keep
        })
        .collect();
    info!(articles = articles.len(), skipped = total - articles.len(), "catalog parsed");
    Ok(articles)
}

pub fn load_catalog(path: &Path) -> Result<Vec<ArticleInput>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge base file: {}", path.display()))?;
    parse_catalog(&content).with_context(|| format!("Invalid catalog: {}", path.display()))
}
