//! # Ticket Triage Core
//!
//! Shared, I/O-free logic for Ticket Triage: data models, text
//! normalization, the keyword rule engine, the embedding provider trait,
//! the knowledge index, recommendation ranking, topic clustering, and
//! usage analytics.
//!
//! This crate contains no tokio, filesystem I/O, or model runtime
//! dependencies. Embedding backends live in the `ticket-triage` app crate
//! and plug in through [`embedding::EmbeddingProvider`].

pub mod classify;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod normalize;
pub mod rank;
pub mod topics;
pub mod usage;

pub use error::{Result, TriageError};
