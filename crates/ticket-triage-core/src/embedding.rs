//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus pure helper functions for similarity and distance
//! computation.
//!
//! Concrete providers (feature hashing, fastembed) live in the
//! `ticket-triage` app crate.

use crate::error::{Result, TriageError};
use crate::models::ModelInfo;

/// Trait for embedding providers.
///
/// A provider is constructed once at startup and shared read-only across
/// all analysis threads. Implementations whose backend needs exclusive
/// access for inference must serialize internally.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model descriptor (name, dimension, max input length).
    fn model_info(&self) -> ModelInfo;

    /// Embed one text. Must be deterministic for identical input.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Check that a vector has the expected dimension and only finite values.
pub fn validate_vector(vec: &[f32], expected: usize) -> Result<()> {
    if vec.len() != expected {
        return Err(TriageError::DimensionMismatch {
            expected,
            actual: vec.len(),
        });
    }
    if vec.iter().any(|v| !v.is_finite()) {
        return Err(TriageError::NonFiniteVector);
    }
    Ok(())
}

/// Dot product over the common prefix of `a` and `b`.
///
/// Equals cosine similarity when both inputs are unit length.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Euclidean distance. Returns `f32::INFINITY` for vectors of different lengths.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return vec.to_vec();
    }
    vec.iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_scale_invariant() {
        let a = vec![1.0, 2.0];
        let b = vec![10.0, 20.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_dot_matches_cosine_on_unit_vectors() {
        let a = l2_normalize(&[3.0, 4.0]);
        let b = l2_normalize(&[1.0, 1.0]);
        assert!((dot_product(&a, &b) - cosine_similarity(&a, &b)).abs() < 1e-6);
        assert_eq!(dot_product(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
    }

    #[test]
    fn test_l2_distance() {
        let d = l2_distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-6);
        assert_eq!(l2_distance(&[1.0], &[1.0, 2.0]), f32::INFINITY);
    }

    #[test]
    fn test_l2_normalize() {
        let n = l2_normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_validate_vector() {
        assert!(validate_vector(&[1.0, 2.0], 2).is_ok());
        assert_eq!(
            validate_vector(&[1.0], 2),
            Err(TriageError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            validate_vector(&[f32::NAN, 1.0], 2),
            Err(TriageError::NonFiniteVector)
        );
    }
}
