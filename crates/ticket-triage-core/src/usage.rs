//! Cumulative usage counters.
//!
//! [`UsageAnalytics`] is shared between analysis threads behind an `Arc`.
//! All counters live under one mutex, so a [`UsageSnapshot`] never mixes
//! the state before and after a single `record` call.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::models::{LanguageTag, Priority, SuggestedArticle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    #[serde(rename = "High")]
    pub high: u64,
    #[serde(rename = "Medium")]
    pub medium: u64,
    #[serde(rename = "Low")]
    pub low: u64,
}

impl PriorityCounts {
    pub fn get(&self, priority: Priority) -> u64 {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }

    pub fn total(&self) -> u64 {
        self.high + self.medium + self.low
    }

    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::High => self.high += 1,
            Priority::Medium => self.medium += 1,
            Priority::Low => self.low += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleUsage {
    /// Article title as last surfaced.
    pub article: String,
    pub article_id: String,
    pub usage_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageShare {
    pub language: String,
    pub code: String,
    pub count: u64,
    pub percentage: f64,
}

/// Point-in-time copy of the usage counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub ticket_count_by_priority: PriorityCounts,
    pub top_articles_usage: Vec<ArticleUsage>,
    pub language_distribution: Vec<LanguageShare>,
    pub total_tickets: u64,
}

#[derive(Debug, Default)]
struct Counters {
    priorities: PriorityCounts,
    // article id -> (title, count)
    articles: HashMap<String, (String, u64)>,
    // language code -> (name, count)
    languages: HashMap<String, (String, u64)>,
    total: u64,
}

#[derive(Debug)]
pub struct UsageAnalytics {
    counters: Mutex<Counters>,
    top_articles: usize,
    top_languages: usize,
}

impl Default for UsageAnalytics {
    fn default() -> Self {
        Self::new(10, 10)
    }
}

impl UsageAnalytics {
    pub fn new(top_articles: usize, top_languages: usize) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            top_articles,
            top_languages,
        }
    }

    /// Count one analysed ticket and the articles surfaced for it.
    pub fn record(
        &self,
        priority: Priority,
        language: &LanguageTag,
        surfaced: &[SuggestedArticle],
    ) {
        let mut c = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        c.priorities.bump(priority);
        c.total += 1;

        let lang = c
            .languages
            .entry(language.code.clone())
            .or_insert_with(|| (language.name.clone(), 0));
        lang.1 += 1;

        for article in surfaced {
            let entry = c
                .articles
                .entry(article.article_id.clone())
                .or_insert_with(|| (article.title.clone(), 0));
            entry.0.clone_from(&article.title);
            entry.1 += 1;
        }
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let c = self.counters.lock().unwrap_or_else(PoisonError::into_inner);

        let mut articles: Vec<ArticleUsage> = c
            .articles
            .iter()
            .map(|(id, (title, count))| ArticleUsage {
                article: title.clone(),
                article_id: id.clone(),
                usage_count: *count,
            })
            .collect();
        articles.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then_with(|| a.article_id.cmp(&b.article_id))
        });
        articles.truncate(self.top_articles);

        let total = c.total;
        let mut languages: Vec<LanguageShare> = c
            .languages
            .iter()
            .map(|(code, (name, count))| LanguageShare {
                language: name.clone(),
                code: code.clone(),
                count: *count,
                percentage: if total == 0 {
                    0.0
                } else {
                    (*count as f64 / total as f64 * 1000.0).round() / 10.0
                },
            })
            .collect();
        languages.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));
        languages.truncate(self.top_languages);

        UsageSnapshot {
            ticket_count_by_priority: c.priorities,
            top_articles_usage: articles,
            language_distribution: languages,
            total_tickets: total,
        }
    }

    pub fn reset(&self) {
        let mut c = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        *c = Counters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn lang(code: &str, name: &str) -> LanguageTag {
        LanguageTag {
            code: code.to_string(),
            name: name.to_string(),
            confidence: 0.9,
        }
    }

    fn suggested(id: &str) -> SuggestedArticle {
        SuggestedArticle {
            article_id: id.to_string(),
            title: format!("Article {}", id),
            score: 0.5,
            distance: 0.5,
            category_match: false,
        }
    }

    #[test]
    fn test_counts_and_totals() {
        let u = UsageAnalytics::default();
        let en = lang("en", "English");
        u.record(Priority::High, &en, &[suggested("a"), suggested("b")]);
        u.record(Priority::Low, &en, &[suggested("a")]);
        u.record(Priority::Low, &lang("de", "German"), &[]);

        let s = u.snapshot();
        assert_eq!(s.total_tickets, 3);
        assert_eq!(s.ticket_count_by_priority.high, 1);
        assert_eq!(s.ticket_count_by_priority.low, 2);
        assert_eq!(s.ticket_count_by_priority.total(), s.total_tickets);
        assert_eq!(s.top_articles_usage[0].article_id, "a");
        assert_eq!(s.top_articles_usage[0].usage_count, 2);
        assert_eq!(s.top_articles_usage[0].article, "Article a");
        assert_eq!(s.language_distribution[0].code, "en");
        assert_eq!(s.language_distribution[0].percentage, 66.7);
        assert_eq!(s.language_distribution[1].percentage, 33.3);
    }

    #[test]
    fn test_ties_broken_by_id_and_top_n() {
        let u = UsageAnalytics::new(2, 1);
        let en = lang("en", "English");
        u.record(Priority::Medium, &en, &[suggested("c"), suggested("b"), suggested("a")]);
        u.record(Priority::Medium, &lang("fr", "French"), &[]);
        let s = u.snapshot();
        let ids: Vec<&str> = s.top_articles_usage.iter().map(|a| a.article_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(s.language_distribution.len(), 1);
        assert_eq!(s.language_distribution[0].code, "en");
    }

    #[test]
    fn test_reset() {
        let u = UsageAnalytics::default();
        u.record(Priority::High, &lang("en", "English"), &[suggested("a")]);
        u.reset();
        let s = u.snapshot();
        assert_eq!(s.total_tickets, 0);
        assert!(s.top_articles_usage.is_empty());
        assert!(s.language_distribution.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let u = UsageAnalytics::default();
        u.record(Priority::Medium, &lang("en", "English"), &[]);
        let v = serde_json::to_value(u.snapshot()).unwrap();
        assert_eq!(v["ticket_count_by_priority"]["Medium"], 1);
        assert_eq!(v["ticket_count_by_priority"]["High"], 0);
        assert_eq!(v["total_tickets"], 1);
        assert_eq!(v["language_distribution"][0]["language"], "English");
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let u = Arc::new(UsageAnalytics::default());
        std::thread::scope(|s| {
            for i in 0..4 {
                let u = Arc::clone(&u);
                s.spawn(move || {
                    let p = Priority::ALL[i % 3];
                    for _ in 0..250 {
                        u.record(p, &lang("en", "English"), &[suggested("kb")]);
                    }
                });
            }
        });
        let s = u.snapshot();
        assert_eq!(s.total_tickets, 1000);
        assert_eq!(s.ticket_count_by_priority.total(), 1000);
        assert_eq!(s.top_articles_usage[0].usage_count, 1000);
    }
}
