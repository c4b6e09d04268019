//! Embedding backends and the [`EmbeddingEngine`] that owns them.
//!
//! Backends implement [`EmbeddingProvider`] from the core crate:
//! - **[`HashingProvider`]** deterministic feature hashing; no model files.
//! - **`LocalProvider`** fastembed sentence models (feature
//!   `local-embeddings-fastembed`).
//!
//! # Provider Selection
//!
//! | Config Value | Provider |
//! |-------------|----------|
//! | `"hashing"` | [`HashingProvider`] |
//! | `"local"` | `LocalProvider` |
//! | `"disabled"` | load fails with `ModelUnavailable` |
//!
//! The engine is loaded once at startup and shared read-only. Every vector
//! it hands out has the advertised dimension and only finite values; a
//! backend that breaks this contract surfaces as `ModelUnavailable`.

mod hashing;
#[cfg(feature = "local-embeddings-fastembed")]
mod local_fastembed;

pub use hashing::HashingProvider;
#[cfg(feature = "local-embeddings-fastembed")]
pub use local_fastembed::LocalProvider;

use tracing::info;

use ticket_triage_core::embedding::{validate_vector, EmbeddingProvider};
use ticket_triage_core::models::ModelInfo;
use ticket_triage_core::{Result, TriageError};

use crate::config::EmbeddingConfig;

const DEFAULT_HASHING_DIMS: usize = 384;

/// Embedded once at load to confirm the backend honours its dimension.
const WARMUP_TEXT: &str = "ticket triage warmup";

/// Create the [`EmbeddingProvider`] named by `config.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashing" => Ok(Box::new(HashingProvider::new(
            config.dims.unwrap_or(DEFAULT_HASHING_DIMS),
            config.max_seq_length,
        ))),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(TriageError::ModelUnavailable(
            "local embedding provider requires --features local-embeddings-fastembed".to_string(),
        )),
        "disabled" => Err(TriageError::ModelUnavailable(
            "embedding provider is disabled".to_string(),
        )),
        other => Err(TriageError::ModelUnavailable(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

pub struct EmbeddingEngine {
    provider: Box<dyn EmbeddingProvider>,
    info: ModelInfo,
    batch_size: usize,
}

impl EmbeddingEngine {
    /// Load the configured backend. Fails with `ModelUnavailable`.
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let provider = create_provider(config)?;
        let engine = Self::from_provider(provider, config.batch_size)?;
        info!(
            provider = %config.provider,
            model = %engine.info.name,
            dimension = engine.info.dimension,
            "embedding engine loaded"
        );
        Ok(engine)
    }

    /// Wrap a backend after checking its advertised dimension against a
    /// real embedding, so a mismatch fails here and not on every request.
    pub fn from_provider(provider: Box<dyn EmbeddingProvider>, batch_size: usize) -> Result<Self> {
        let info = provider.model_info();
        if info.dimension == 0 {
            return Err(TriageError::ModelUnavailable(format!(
                "embedding model '{}' reports dimension 0",
                info.name
            )));
        }
        let engine = Self {
            provider,
            info,
            batch_size: batch_size.max(1),
        };
        engine.embed(WARMUP_TEXT)?;
        Ok(engine)
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn dimension(&self) -> usize {
        self.info.dimension
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vec = self.provider.embed(text).map_err(unavailable)?;
        self.check(&vec)?;
        Ok(vec)
    }

    /// Embed texts in chunks of `batch_size`, preserving input order.
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let vecs = self.provider.embed_batch(chunk).map_err(unavailable)?;
            if vecs.len() != chunk.len() {
                return Err(TriageError::ModelUnavailable(format!(
                    "backend returned {} embeddings for {} inputs",
                    vecs.len(),
                    chunk.len()
                )));
            }
            for v in &vecs {
                self.check(v)?;
            }
            out.extend(vecs);
        }
        Ok(out)
    }

    fn check(&self, vec: &[f32]) -> Result<()> {
        validate_vector(vec, self.info.dimension).map_err(|e| {
            TriageError::ModelUnavailable(format!("backend produced an invalid embedding: {}", e))
        })
    }
}

fn unavailable(err: TriageError) -> TriageError {
    match err {
        TriageError::ModelUnavailable(_) => err,
        other => TriageError::ModelUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenProvider {
        output: Vec<f32>,
        // Embeddings served correctly before `output` is returned.
        healthy_calls: std::sync::atomic::AtomicUsize,
    }

    impl BrokenProvider {
        fn new(output: Vec<f32>, healthy_calls: usize) -> Self {
            Self {
                output,
                healthy_calls: std::sync::atomic::AtomicUsize::new(healthy_calls),
            }
        }
    }

    impl EmbeddingProvider for BrokenProvider {
        fn model_info(&self) -> ModelInfo {
            ModelInfo {
                name: "broken".to_string(),
                dimension: 3,
                max_seq_length: 8,
            }
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            use std::sync::atomic::Ordering;
            let healthy = self
                .healthy_calls
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if healthy {
                Ok(vec![0.0, 1.0, 0.0])
            } else {
                Ok(self.output.clone())
            }
        }
    }

    #[test]
    fn test_load_hashing_defaults() {
        let engine = EmbeddingEngine::load(&EmbeddingConfig::default()).unwrap();
        assert_eq!(engine.dimension(), 384);
        assert_eq!(engine.model_info().max_seq_length, 256);
        assert_eq!(engine.embed("hello world").unwrap().len(), 384);
    }

    #[test]
    fn test_disabled_and_unknown_providers() {
        for name in ["disabled", "openai-ish"] {
            let config = EmbeddingConfig {
                provider: name.to_string(),
                ..EmbeddingConfig::default()
            };
            assert!(matches!(
                EmbeddingEngine::load(&config),
                Err(TriageError::ModelUnavailable(_))
            ));
        }
    }

    #[test]
    fn test_zero_dims_rejected_at_load() {
        let config = EmbeddingConfig {
            dims: Some(0),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            EmbeddingEngine::load(&config),
            Err(TriageError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_rejected_at_load() {
        // Advertises 3 dimensions but produces 2 from the first call.
        let result =
            EmbeddingEngine::from_provider(Box::new(BrokenProvider::new(vec![1.0, 2.0], 0)), 4);
        match result {
            Err(TriageError::ModelUnavailable(msg)) => {
                assert!(msg.contains("dimension"), "{}", msg)
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("mismatched backend was accepted"),
        }
    }

    #[test]
    fn test_wrong_length_is_unavailable() {
        let engine =
            EmbeddingEngine::from_provider(Box::new(BrokenProvider::new(vec![1.0, 2.0], 1)), 4)
                .unwrap();
        assert!(matches!(
            engine.embed("x"),
            Err(TriageError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_non_finite_is_unavailable() {
        let engine = EmbeddingEngine::from_provider(
            Box::new(BrokenProvider::new(vec![1.0, f32::NAN, 0.0], 1)),
            4,
        )
        .unwrap();
        assert!(matches!(
            engine.embed_batch(&["x".to_string()]),
            Err(TriageError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_batch_matches_single() {
        let config = EmbeddingConfig {
            dims: Some(32),
            batch_size: 2,
            ..EmbeddingConfig::default()
        };
        let engine = EmbeddingEngine::load(&config).unwrap();
        let texts: Vec<String> = ["one two", "three", "four five six"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let batch = engine.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 3);
        for (t, v) in texts.iter().zip(&batch) {
            assert_eq!(&engine.embed(t).unwrap(), v);
        }
    }
}
