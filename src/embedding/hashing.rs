//! Deterministic feature-hashing embedder.
//!
//! Each word unigram and adjacent-word bigram is hashed with SHA-256 into
//! one of D buckets, with a sign taken from the same digest so that
//! collisions tend to cancel rather than accumulate. The result is
//! L2-normalised. No model files or network access are involved, which
//! makes this the default provider for tests and offline use.

use sha2::{Digest, Sha256};

use ticket_triage_core::embedding::{l2_normalize, EmbeddingProvider};
use ticket_triage_core::models::ModelInfo;
use ticket_triage_core::Result;

const BIGRAM_WEIGHT: f32 = 0.5;

pub struct HashingProvider {
    dims: usize,
    max_seq_length: usize,
}

impl HashingProvider {
    pub fn new(dims: usize, max_seq_length: usize) -> Self {
        Self {
            dims,
            max_seq_length,
        }
    }

    fn add_feature(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vec[bucket] += sign * weight;
    }
}

/// Lowercased alphanumeric word tokens, truncated to `limit`.
pub(crate) fn word_tokens(text: &str, limit: usize) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(limit)
        .map(|w| w.to_lowercase())
        .collect()
}

impl EmbeddingProvider for HashingProvider {
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: "sha256-feature-hashing".to_string(),
            dimension: self.dims,
            max_seq_length: self.max_seq_length,
        }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = word_tokens(text, self.max_seq_length);
        let mut vec = vec![0.0f32; self.dims];
        for token in &tokens {
            self.add_feature(&mut vec, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vec, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }
        Ok(l2_normalize(&vec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticket_triage_core::embedding::cosine_similarity;

    #[test]
    fn test_deterministic_and_sized() {
        let p = HashingProvider::new(64, 256);
        let a = p.embed("password reset link expired").unwrap();
        let b = p.embed("password reset link expired").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_unit_length() {
        let p = HashingProvider::new(128, 256);
        let v = p.embed("invoice charged twice").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_words_are_closer() {
        let p = HashingProvider::new(384, 256);
        let q = p.embed("cannot reset my password").unwrap();
        let near = p.embed("how to reset a forgotten password").unwrap();
        let far = p.embed("invoice shows a duplicate charge").unwrap();
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn test_truncates_to_max_seq_length() {
        let p = HashingProvider::new(64, 2);
        let a = p.embed("alpha beta gamma delta").unwrap();
        let b = p.embed("alpha beta").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let p = HashingProvider::new(8, 16);
        assert_eq!(p.embed("...").unwrap(), vec![0.0; 8]);
    }

    #[test]
    fn test_word_tokens() {
        assert_eq!(word_tokens("Hello, World! 42", 10), vec!["hello", "world", "42"]);
        assert_eq!(word_tokens("a b c", 2), vec!["a", "b"]);
    }
}
