//! Typed errors for the analysis pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TriageError>;

/// Errors raised by the core pipeline.
///
/// Only [`TriageError::EmptyInput`] and [`TriageError::ModelUnavailable`]
/// ever escape `analyze`; the index errors are absorbed by the ranker.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TriageError {
    #[error("ticket text is empty after normalization")]
    EmptyInput,

    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("knowledge index is empty")]
    EmptyIndex,

    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("duplicate article id: {0}")]
    DuplicateArticle(String),

    #[error("vector contains non-finite values")]
    NonFiniteVector,
}
