//! Topic clustering over previously analysed tickets.
//!
//! Groups ticket embeddings with spherical k-means and labels each group
//! with its most frequent non-stopword tokens. This runs over a batch on
//! demand, never per request.
//!
//! # Algorithm
//!
//! 1. Unit-normalise the embeddings; tickets whose vector does not match
//!    the first ticket's dimension, or is non-finite, become outliers.
//! 2. `k = min(max_topics, max(1, round(sqrt(n / 2))))`.
//! 3. Seed centroids by farthest-point selection starting at ticket 0.
//! 4. Alternate assignment and centroid update until assignments stop
//!    changing or `max_iterations` is reached.
//! 5. Clusters smaller than `min_topic_size` become outliers.
//! 6. Order clusters by size (desc) and number them from 0.
//!
//! Cluster ids are only meaningful within one [`TopicRun`]. A later run
//! over a different corpus may number the same theme differently.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::embedding::{cosine_similarity, dot_product, l2_normalize};
use crate::models::TopicAssignment;

const TOPIC_STOPWORDS: &[&str] = &[
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is", "are",
    "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "can", "this", "that", "these", "those", "you",
    "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my", "our", "your", "not",
    "from", "any", "all", "get", "got", "just", "still", "also", "when", "what", "how", "there",
    "here", "about", "after", "again", "please", "thanks", "hello", "since",
];

const REPRESENTATIVE_TEXTS: usize = 3;

/// A ticket recorded for topic analysis.
#[derive(Debug, Clone)]
pub struct RecordedTicket {
    pub id: Uuid,
    pub tokens: Vec<String>,
    pub display: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct TopicParams {
    pub max_topics: usize,
    pub min_topic_size: usize,
    pub max_iterations: usize,
    pub keywords_per_topic: usize,
}

impl Default for TopicParams {
    fn default() -> Self {
        Self {
            max_topics: 8,
            min_topic_size: 2,
            max_iterations: 50,
            keywords_per_topic: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicCluster {
    pub cluster_id: usize,
    pub keywords: Vec<String>,
    pub member_ids: Vec<Uuid>,
    pub representative_texts: Vec<String>,
    pub count: usize,
    pub percentage: f64,
    #[serde(skip)]
    centroid: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GapSeverity {
    High,
    Medium,
}

/// An under-represented topic, hinting at missing knowledge-base coverage.
#[derive(Debug, Clone, Serialize)]
pub struct ContentGap {
    pub topic_id: usize,
    pub keywords: Vec<String>,
    pub current_count: usize,
    pub percentage: f64,
    pub severity: GapSeverity,
}

/// Result of one aggregation run.
#[derive(Debug, Clone, Serialize)]
pub struct TopicRun {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub total_documents: usize,
    pub topics: Vec<TopicCluster>,
    pub outlier_ids: Vec<Uuid>,
}

impl TopicRun {
    pub fn empty(total_documents: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            total_documents,
            topics: Vec::new(),
            outlier_ids: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Nearest topic centroid for an embedding, by cosine similarity.
    ///
    /// Returns `None` when the run has no topics or the dimension differs.
    pub fn assign(&self, embedding: &[f32]) -> Option<TopicAssignment> {
        let mut best: Option<(&TopicCluster, f32)> = None;
        for topic in &self.topics {
            if topic.centroid.len() != embedding.len() {
                return None;
            }
            let sim = cosine_similarity(&topic.centroid, embedding);
            if best.map_or(true, |(_, b)| sim > b) {
                best = Some((topic, sim));
            }
        }
        best.map(|(topic, sim)| TopicAssignment {
            topic_id: topic.cluster_id,
            keywords: topic.keywords.clone(),
            similarity: sim as f64,
        })
    }

    /// Topics holding less than `threshold × 100` percent of the corpus.
    ///
    /// Severity is `high` below half the threshold. Sorted by percentage (asc).
    pub fn content_gaps(&self, threshold: f64) -> Vec<ContentGap> {
        let cutoff = threshold * 100.0;
        let mut gaps: Vec<ContentGap> = self
            .topics
            .iter()
            .filter(|t| t.percentage < cutoff)
            .map(|t| ContentGap {
                topic_id: t.cluster_id,
                keywords: t.keywords.clone(),
                current_count: t.count,
                percentage: t.percentage,
                severity: if t.percentage < cutoff / 2.0 {
                    GapSeverity::High
                } else {
                    GapSeverity::Medium
                },
            })
            .collect();
        gaps.sort_by(|a, b| {
            a.percentage
                .partial_cmp(&b.percentage)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.topic_id.cmp(&b.topic_id))
        });
        gaps
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopicAggregator {
    params: TopicParams,
}

impl TopicAggregator {
    pub fn new(params: TopicParams) -> Self {
        Self { params }
    }

    pub fn aggregate(&self, tickets: &[RecordedTicket]) -> TopicRun {
        let total = tickets.len();
        let min_size = self.params.min_topic_size.max(1);
        if total == 0 || total < min_size {
            return TopicRun::empty(total);
        }

        let dim = tickets[0].embedding.len();
        let mut outliers = Vec::new();
        let mut members: Vec<usize> = Vec::with_capacity(total);
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(total);
        for (i, t) in tickets.iter().enumerate() {
            if dim == 0 || t.embedding.len() != dim || t.embedding.iter().any(|x| !x.is_finite()) {
                outliers.push(t.id);
            } else {
                members.push(i);
                vectors.push(l2_normalize(&t.embedding));
            }
        }

        let n = vectors.len();
        if n == 0 || n < min_size {
            let mut run = TopicRun::empty(total);
            run.outlier_ids = tickets.iter().map(|t| t.id).collect();
            return run;
        }

        let target_k = ((n as f64 / 2.0).sqrt().round() as usize).max(1);
        let k = target_k.min(self.params.max_topics.max(1)).min(n);

        let mut centroids = seed_centroids(&vectors, k);
        let mut assignment = vec![usize::MAX; n];
        for _ in 0..self.params.max_iterations.max(1) {
            let mut changed = false;
            for (i, v) in vectors.iter().enumerate() {
                let c = nearest(&centroids, v);
                if assignment[i] != c {
                    assignment[i] = c;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            centroids = update_centroids(&vectors, &assignment, &centroids);
        }

        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); centroids.len()];
        for (i, &c) in assignment.iter().enumerate() {
            groups[c].push(i);
        }

        let mut kept: Vec<(Vec<usize>, Vec<f32>)> = Vec::new();
        for (group, centroid) in groups.into_iter().zip(centroids) {
            if group.len() >= min_size {
                kept.push((group, centroid));
            } else {
                outliers.extend(group.iter().map(|&i| tickets[members[i]].id));
            }
        }
        // Groups are filled in position order, so group[0] is the earliest member.
        kept.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0[0].cmp(&b.0[0])));

        let topics: Vec<TopicCluster> = kept
            .into_iter()
            .enumerate()
            .map(|(cluster_id, (group, centroid))| {
                let member_tickets: Vec<&RecordedTicket> =
                    group.iter().map(|&i| &tickets[members[i]]).collect();

                let mut by_closeness: Vec<(usize, f32)> = group
                    .iter()
                    .map(|&i| (i, dot_product(&vectors[i], &centroid)))
                    .collect();
                by_closeness.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.0.cmp(&b.0))
                });

                TopicCluster {
                    cluster_id,
                    keywords: top_keywords(&member_tickets, self.params.keywords_per_topic),
                    member_ids: member_tickets.iter().map(|t| t.id).collect(),
                    representative_texts: by_closeness
                        .iter()
                        .take(REPRESENTATIVE_TEXTS)
                        .map(|&(i, _)| tickets[members[i]].display.clone())
                        .collect(),
                    count: group.len(),
                    percentage: round2(group.len() as f64 / total as f64 * 100.0),
                    centroid,
                }
            })
            .collect();

        info!(
            tickets = total,
            topics = topics.len(),
            outliers = outliers.len(),
            "topic aggregation finished"
        );

        TopicRun {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            total_documents: total,
            topics,
            outlier_ids: outliers,
        }
    }
}

fn nearest(centroids: &[Vec<f32>], v: &[f32]) -> usize {
    let mut best = 0;
    let mut best_sim = f32::NEG_INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let sim = dot_product(centroid, v);
        if sim > best_sim {
            best = c;
            best_sim = sim;
        }
    }
    best
}

/// Farthest-point seeding from vector 0. Stops early when every remaining
/// vector coincides with an existing centroid.
fn seed_centroids(vectors: &[Vec<f32>], k: usize) -> Vec<Vec<f32>> {
    let mut centroids = vec![vectors[0].clone()];
    while centroids.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (i, v) in vectors.iter().enumerate() {
            let closest = centroids
                .iter()
                .map(|c| 1.0 - dot_product(c, v))
                .fold(f32::INFINITY, f32::min);
            if best.map_or(true, |(_, d)| closest > d) {
                best = Some((i, closest));
            }
        }
        match best {
            Some((i, d)) if d > 1e-6 => centroids.push(vectors[i].clone()),
            _ => break,
        }
    }
    centroids
}

fn update_centroids(
    vectors: &[Vec<f32>],
    assignment: &[usize],
    previous: &[Vec<f32>],
) -> Vec<Vec<f32>> {
    let dim = vectors[0].len();
    let mut sums = vec![vec![0.0f32; dim]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (v, &c) in vectors.iter().zip(assignment) {
        counts[c] += 1;
        for (s, x) in sums[c].iter_mut().zip(v) {
            *s += x;
        }
    }
    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, count), prev)| {
            if count == 0 {
                prev.clone()
            } else {
                l2_normalize(&sum)
            }
        })
        .collect()
}

fn top_keywords(tickets: &[&RecordedTicket], limit: usize) -> Vec<String> {
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for t in tickets {
        for token in &t.tokens {
            if token.chars().count() < 3
                || token.chars().all(|c| c.is_numeric())
                || TOPIC_STOPWORDS.contains(&token.as_str())
            {
                continue;
            }
            *freq.entry(token.as_str()).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = freq.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.into_iter().take(limit).map(|(w, _)| w.to_string()).collect()
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
