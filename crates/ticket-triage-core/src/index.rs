//! In-memory nearest-neighbor index over knowledge-base articles.
//!
//! The index is read-mostly. Each [`KnowledgeIndex::rebuild`] builds a
//! complete [`IndexSnapshot`] off to the side and then publishes it by
//! swapping an `Arc` under a write lock held only for the pointer store.
//! Queries clone the current `Arc` and search it without holding any lock,
//! so an in-flight query always sees one fully built snapshot.
//!
//! Search is exact brute force under the metric fixed at construction.
//! For cosine the article vectors are unit-normalised once per rebuild.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::embedding::{dot_product, l2_distance, l2_normalize, validate_vector};
use crate::error::{Result, TriageError};
use crate::models::KnowledgeArticle;

/// Distance metric, fixed for the lifetime of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `1 - cos(a, b)`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Euclidean distance.
    L2,
}

impl Metric {
    /// Map a distance to a similarity where larger is closer.
    ///
    /// Cosine: `1 - d`. L2: `1 / (1 + d)`.
    pub fn similarity(&self, distance: f32) -> f64 {
        match self {
            Metric::Cosine => 1.0 - distance as f64,
            Metric::L2 => 1.0 / (1.0 + distance as f64),
        }
    }
}

/// One query hit, carrying the article from the snapshot that produced it.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub article: Arc<KnowledgeArticle>,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub articles: usize,
    pub dimension: usize,
    pub metric: Metric,
    /// Number of successful rebuilds since construction.
    pub generation: u64,
}

/// An immutable, fully built search structure.
#[derive(Debug)]
pub struct IndexSnapshot {
    articles: Vec<Arc<KnowledgeArticle>>,
    /// Search vectors, parallel to `articles` (unit-normalised for cosine).
    vectors: Vec<Vec<f32>>,
    generation: u64,
}

impl IndexSnapshot {
    fn empty() -> Self {
        Self {
            articles: Vec::new(),
            vectors: Vec::new(),
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn articles(&self) -> &[Arc<KnowledgeArticle>] {
        &self.articles
    }
}

pub struct KnowledgeIndex {
    dimension: usize,
    metric: Metric,
    current: RwLock<Arc<IndexSnapshot>>,
}

impl KnowledgeIndex {
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            current: RwLock::new(Arc::new(IndexSnapshot::empty())),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Look up an article in the current snapshot.
    pub fn article(&self, id: &str) -> Option<Arc<KnowledgeArticle>> {
        self.snapshot()
            .articles
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn stats(&self) -> IndexStats {
        let snap = self.snapshot();
        IndexStats {
            articles: snap.len(),
            dimension: self.dimension,
            metric: self.metric,
            generation: snap.generation,
        }
    }

    /// Replace the whole index with `articles`.
    ///
    /// All embeddings are validated and ids must be unique; on any failure
    /// the previous snapshot stays published. An empty set is accepted and
    /// makes subsequent queries fail with [`TriageError::EmptyIndex`].
    ///
    /// Returns the generation number of the new snapshot.
    pub fn rebuild(&self, articles: Vec<KnowledgeArticle>) -> Result<u64> {
        let mut seen = HashSet::with_capacity(articles.len());
        for article in &articles {
            validate_vector(&article.embedding, self.dimension)?;
            if !seen.insert(article.id.as_str()) {
                return Err(TriageError::DuplicateArticle(article.id.clone()));
            }
        }

        let vectors: Vec<Vec<f32>> = articles
            .iter()
            .map(|a| match self.metric {
                Metric::Cosine => l2_normalize(&a.embedding),
                Metric::L2 => a.embedding.clone(),
            })
            .collect();
        let articles: Vec<Arc<KnowledgeArticle>> = articles.into_iter().map(Arc::new).collect();
        let count = articles.len();

        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let generation = guard.generation + 1;
        *guard = Arc::new(IndexSnapshot {
            articles,
            vectors,
            generation,
        });
        drop(guard);

        info!(articles = count, generation, "knowledge index rebuilt");
        Ok(generation)
    }

    /// Up to `k` nearest articles, closest first (ties by article id).
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let snap = self.snapshot();
        if snap.is_empty() {
            return Err(TriageError::EmptyIndex);
        }
        validate_vector(query, self.dimension)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = match self.metric {
            Metric::Cosine => l2_normalize(query),
            Metric::L2 => query.to_vec(),
        };

        let mut hits: Vec<(usize, f32)> = snap
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, self.distance(&query, v)))
            .collect();

        hits.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| snap.articles[a.0].id.cmp(&snap.articles[b.0].id))
        });
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(i, distance)| Neighbor {
                article: Arc::clone(&snap.articles[i]),
                distance,
            })
            .collect())
    }

    /// Up to `k` `(article_id, distance)` pairs ordered by increasing distance.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        Ok(self
            .search(query, k)?
            .into_iter()
            .map(|n| (n.article.id.clone(), n.distance))
            .collect())
    }

    /// Distance between two search vectors (both already prepared for the metric).
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            Metric::Cosine => (1.0 - dot_product(a, b)).max(0.0),
            Metric::L2 => l2_distance(a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(id: &str, embedding: Vec<f32>) -> KnowledgeArticle {
        KnowledgeArticle {
            id: id.to_string(),
            title: format!("Article {}", id),
            body: String::new(),
            category: None,
            embedding,
        }
    }

    fn sample_index(metric: Metric) -> KnowledgeIndex {
        let index = KnowledgeIndex::new(3, metric);
        index
            .rebuild(vec![
                article("a", vec![1.0, 0.0, 0.0]),
                article("b", vec![0.9, 0.1, 0.0]),
                article("c", vec![0.0, 1.0, 0.0]),
                article("d", vec![0.0, 0.0, 1.0]),
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_query_closest_first() {
        let index = sample_index(Metric::Cosine);
        let hits = index.query(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "a");
        assert!(hits[0].1.abs() < 1e-6);
        assert_eq!(hits[1].0, "b");
    }

    #[test]
    fn test_query_never_exceeds_k_and_is_sorted() {
        let index = sample_index(Metric::Cosine);
        for k in 0..6 {
            let hits = index.query(&[0.3, 0.5, 0.2], k).unwrap();
            assert!(hits.len() <= k);
            assert_eq!(hits.len(), k.min(4));
            for w in hits.windows(2) {
                assert!(w[0].1 <= w[1].1);
            }
            let ids: HashSet<&String> = hits.iter().map(|(id, _)| id).collect();
            assert_eq!(ids.len(), hits.len());
        }
    }

    #[test]
    fn test_query_unnormalised_input() {
        let index = sample_index(Metric::Cosine);
        let hits = index.query(&[50.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].0, "a");
    }

    #[test]
    fn test_l2_metric() {
        let index = sample_index(Metric::L2);
        let hits = index.query(&[0.0, 0.9, 0.0], 1).unwrap();
        assert_eq!(hits[0].0, "c");
        assert!((hits[0].1 - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let index = KnowledgeIndex::new(2, Metric::Cosine);
        index
            .rebuild(vec![
                article("z", vec![1.0, 0.0]),
                article("m", vec![1.0, 0.0]),
            ])
            .unwrap();
        let hits = index.query(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].0, "m");
        assert_eq!(hits[1].0, "z");
    }

    #[test]
    fn test_empty_index_errors() {
        let index = KnowledgeIndex::new(3, Metric::Cosine);
        assert_eq!(index.query(&[1.0, 0.0, 0.0], 3), Err(TriageError::EmptyIndex));

        let index = sample_index(Metric::Cosine);
        index.rebuild(Vec::new()).unwrap();
        assert_eq!(index.query(&[1.0, 0.0, 0.0], 3), Err(TriageError::EmptyIndex));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = sample_index(Metric::Cosine);
        assert!(matches!(
            index.query(&[1.0, 0.0], 1),
            Err(TriageError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_snapshot() {
        let index = sample_index(Metric::Cosine);
        let err = index
            .rebuild(vec![article("x", vec![1.0, 0.0, 0.0]), article("x", vec![0.0, 1.0, 0.0])])
            .unwrap_err();
        assert_eq!(err, TriageError::DuplicateArticle("x".to_string()));

        let err = index.rebuild(vec![article("y", vec![1.0])]).unwrap_err();
        assert!(matches!(err, TriageError::DimensionMismatch { .. }));

        assert_eq!(index.len(), 4);
        assert_eq!(index.stats().generation, 1);
    }

    #[test]
    fn test_rebuild_bumps_generation() {
        let index = sample_index(Metric::Cosine);
        let g = index.rebuild(vec![article("only", vec![0.0, 1.0, 0.0])]).unwrap();
        assert_eq!(g, 2);
        assert_eq!(index.len(), 1);
        assert!(index.article("a").is_none());
        assert_eq!(index.article("only").unwrap().title, "Article only");
    }

    #[test]
    fn test_snapshot_survives_rebuild() {
        let index = sample_index(Metric::Cosine);
        let old = index.snapshot();
        index.rebuild(Vec::new()).unwrap();
        assert_eq!(old.len(), 4);
        assert!(index.is_empty());
    }

    #[test]
    fn test_concurrent_queries_during_rebuild() {
        let index = Arc::new(sample_index(Metric::Cosine));
        std::thread::scope(|s| {
            for _ in 0..4 {
                let index = Arc::clone(&index);
                s.spawn(move || {
                    for _ in 0..200 {
                        // Either a full 4-article snapshot or a full 2-article one.
                        let hits = index.query(&[1.0, 0.0, 0.0], 10).unwrap();
                        assert!(hits.len() == 4 || hits.len() == 2);
                    }
                });
            }
            let index = Arc::clone(&index);
            s.spawn(move || {
                for i in 0..50 {
                    let articles = if i % 2 == 0 {
                        vec![article("p", vec![1.0, 0.0, 0.0]), article("q", vec![0.0, 1.0, 0.0])]
                    } else {
                        vec![
                            article("a", vec![1.0, 0.0, 0.0]),
                            article("b", vec![0.9, 0.1, 0.0]),
                            article("c", vec![0.0, 1.0, 0.0]),
                            article("d", vec![0.0, 0.0, 1.0]),
                        ]
                    };
                    index.rebuild(articles).unwrap();
                }
            });
        });
    }
}
