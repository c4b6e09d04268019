//! Local sentence-embedding models via fastembed.
//!
//! Models are downloaded from Hugging Face on first use and cached; after
//! that inference runs fully offline. fastembed needs `&mut` access for
//! inference, so the model sits behind a mutex and concurrent callers
//! take turns.

use std::sync::{Mutex, PoisonError};

use tracing::info;

use ticket_triage_core::embedding::EmbeddingProvider;
use ticket_triage_core::models::ModelInfo;
use ticket_triage_core::{Result, TriageError};

use super::hashing::word_tokens;
use crate::config::EmbeddingConfig;

pub struct LocalProvider {
    model: Mutex<fastembed::TextEmbedding>,
    model_name: String,
    dims: usize,
    max_seq_length: usize,
    batch_size: usize,
}

impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        let fastembed_model = config_to_fastembed_model(&model_name)?;

        info!(model = %model_name, dims, "loading local embedding model");
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(false),
        )
        .map_err(|e| {
            TriageError::ModelUnavailable(format!(
                "failed to initialize local embedding model '{}': {}",
                model_name, e
            ))
        })?;

        Ok(Self {
            model: Mutex::new(model),
            model_name,
            dims,
            max_seq_length: config.max_seq_length,
            batch_size: config.batch_size,
        })
    }

    fn truncate(&self, text: &str) -> String {
        word_tokens(text, self.max_seq_length).join(" ")
    }
}

impl EmbeddingProvider for LocalProvider {
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: self.model_name.clone(),
            dimension: self.dims,
            max_seq_length: self.max_seq_length,
        }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| TriageError::ModelUnavailable("empty embedding response".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<String> = texts.iter().map(|t| self.truncate(t)).collect();
        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        model
            .embed(inputs, Some(self.batch_size))
            .map_err(|e| TriageError::ModelUnavailable(format!("local embedding failed: {}", e)))
    }
}

fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| "all-minilm-l6-v2".to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "bge-base-en-v1.5" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-base" => 768,
        "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
        _ => 384,
    });

    (model_name, dims)
}

fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => Err(TriageError::ModelUnavailable(format!(
            "unknown local embedding model '{}'; supported: all-minilm-l6-v2, \
             bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, nomic-embed-text-v1, \
             nomic-embed-text-v1.5, multilingual-e5-small, multilingual-e5-base, \
             multilingual-e5-large",
            other
        ))),
    }
}
