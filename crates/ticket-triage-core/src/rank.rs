//! Recommendation ranking over the knowledge index.
//!
//! # Algorithm
//!
//! 1. Query the index for `limit × candidate_factor` neighbours.
//! 2. Convert each distance to a similarity via the index metric.
//! 3. Add `category_boost` when the article's category equals the
//!    ticket's detected category. The boost never filters anything out.
//! 4. Deduplicate by article id (first occurrence kept).
//! 5. Sort by score (desc), distance (asc), article id (asc).
//! 6. Truncate to `limit`.
//!
//! Recommendation is best-effort: an empty or incompatible index yields an
//! empty list instead of an error.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::TriageError;
use crate::index::KnowledgeIndex;
use crate::models::SuggestedArticle;

/// Ranking tuning parameters.
#[derive(Debug, Clone)]
pub struct RankParams {
    /// Number of recommendations to return.
    pub limit: usize,
    /// Multiplier for the candidate superset fetched from the index.
    pub candidate_factor: usize,
    /// Score bonus for a category match.
    pub category_boost: f64,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            limit: 3,
            candidate_factor: 2,
            category_boost: 0.15,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecommendationRanker {
    params: RankParams,
}

impl RecommendationRanker {
    pub fn new(params: RankParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RankParams {
        &self.params
    }

    /// Rank articles for a query embedding using the configured limit.
    pub fn recommend(
        &self,
        index: &KnowledgeIndex,
        query: &[f32],
        category: &str,
    ) -> Vec<SuggestedArticle> {
        self.recommend_n(index, query, category, self.params.limit)
    }

    /// Rank up to `limit` articles for a query embedding.
    pub fn recommend_n(
        &self,
        index: &KnowledgeIndex,
        query: &[f32],
        category: &str,
        limit: usize,
    ) -> Vec<SuggestedArticle> {
        if limit == 0 {
            return Vec::new();
        }

        let candidate_k = limit.saturating_mul(self.params.candidate_factor.max(1));
        let neighbors = match index.search(query, candidate_k) {
            Ok(n) => n,
            Err(TriageError::EmptyIndex) => {
                debug!("knowledge index is empty, no recommendations");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "knowledge index query failed, no recommendations");
                return Vec::new();
            }
        };

        let metric = index.metric();
        let mut seen = HashSet::with_capacity(neighbors.len());
        let mut ranked: Vec<SuggestedArticle> = neighbors
            .into_iter()
            .filter(|n| seen.insert(n.article.id.clone()))
            .map(|n| {
                let category_match = n
                    .article
                    .category
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(category));
                let mut score = metric.similarity(n.distance);
                if category_match {
                    score += self.params.category_boost;
                }
                SuggestedArticle {
                    article_id: n.article.id.clone(),
                    title: n.article.title.clone(),
                    score,
                    distance: n.distance,
                    category_match,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    a.distance
                        .partial_cmp(&b.distance)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then_with(|| a.article_id.cmp(&b.article_id))
        });
        ranked.truncate(limit);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Metric;
    use crate::models::KnowledgeArticle;

    fn article(id: &str, category: Option<&str>, embedding: Vec<f32>) -> KnowledgeArticle {
        KnowledgeArticle {
            id: id.to_string(),
            title: format!("Title {}", id),
            body: String::new(),
            category: category.map(str::to_string),
            embedding,
        }
    }

    fn index() -> KnowledgeIndex {
        let index = KnowledgeIndex::new(2, Metric::Cosine);
        index
            .rebuild(vec![
                article("near", Some("Technical Issue"), vec![1.0, 0.0]),
                article("close", Some("Billing Question"), vec![0.95, 0.3]),
                article("mid", Some("Billing Question"), vec![0.7, 0.7]),
                article("far", None, vec![0.0, 1.0]),
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_pure_similarity_order() {
        let ranker = RecommendationRanker::new(RankParams {
            limit: 3,
            candidate_factor: 2,
            category_boost: 0.0,
        });
        let out = ranker.recommend(&index(), &[1.0, 0.0], "General");
        let ids: Vec<&str> = out.iter().map(|a| a.article_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "close", "mid"]);
        assert!((out[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_category_boost_reorders_without_filtering() {
        let ranker = RecommendationRanker::new(RankParams {
            limit: 3,
            candidate_factor: 2,
            category_boost: 0.2,
        });
        let out = ranker.recommend(&index(), &[1.0, 0.0], "Billing Question");
        assert_eq!(out[0].article_id, "close");
        assert!(out[0].category_match);
        // The strong semantic match without the category is still present.
        assert!(out.iter().any(|a| a.article_id == "near"));
    }

    #[test]
    fn test_category_match_case_insensitive() {
        let ranker = RecommendationRanker::default();
        let out = ranker.recommend(&index(), &[1.0, 0.0], "technical issue");
        assert!(out[0].category_match);
    }

    #[test]
    fn test_truncates_and_dedups() {
        let ranker = RecommendationRanker::new(RankParams {
            limit: 2,
            ..RankParams::default()
        });
        let out = ranker.recommend(&index(), &[0.5, 0.5], "General");
        assert_eq!(out.len(), 2);
        let ids: HashSet<&str> = out.iter().map(|a| a.article_id.as_str()).collect();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_deterministic() {
        let ranker = RecommendationRanker::default();
        let idx = index();
        let a = ranker.recommend(&idx, &[0.3, 0.8], "Billing Question");
        let b = ranker.recommend(&idx, &[0.3, 0.8], "Billing Question");
        assert_eq!(a, b);
    }

    #[test]
    fn test_fewer_articles_than_limit() {
        let ranker = RecommendationRanker::new(RankParams {
            limit: 10,
            ..RankParams::default()
        });
        assert_eq!(ranker.recommend(&index(), &[1.0, 0.0], "General").len(), 4);
    }

    #[test]
    fn test_empty_index_yields_empty_list() {
        let idx = KnowledgeIndex::new(2, Metric::Cosine);
        idx.rebuild(Vec::new()).unwrap();
        let out = RecommendationRanker::default().recommend(&idx, &[1.0, 0.0], "General");
        assert!(out.is_empty());
    }

    #[test]
    fn test_dimension_mismatch_yields_empty_list() {
        let out = RecommendationRanker::default().recommend(&index(), &[1.0, 0.0, 0.0], "General");
        assert!(out.is_empty());
    }

    #[test]
    fn test_l2_scores_in_unit_range() {
        let idx = KnowledgeIndex::new(2, Metric::L2);
        idx.rebuild(vec![article("x", None, vec![3.0, 4.0])]).unwrap();
        let out = RecommendationRanker::default().recommend(&idx, &[0.0, 0.0], "General");
        assert!((out[0].score - 1.0 / 6.0).abs() < 1e-6);
    }
}
