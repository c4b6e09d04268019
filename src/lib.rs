//! # Ticket Triage
//!
//! Analyses incoming support tickets: classifies priority, category, and
//! sentiment with a keyword rule engine, embeds the text, recommends
//! knowledge-base articles by nearest-neighbor search, and keeps usage
//! analytics plus on-demand topic clusters over what it has seen.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌────────────────┐
//! │  Catalog   │──▶│  Embedding   │──▶│ KnowledgeIndex │
//! │ (KB JSON)  │   │   Engine     │   │  (snapshots)   │
//! └────────────┘   └──────┬───────┘   └───────┬────────┘
//!                         │                   │
//!   ticket text ──▶ TicketAnalyzer ◀──────────┘
//!                         │
//!              ┌──────────┴──────────┐
//!              ▼                     ▼
//!        UsageAnalytics        ticket corpus ──▶ TopicAggregator
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`embedding`] | Embedding backends and the engine wrapping them |
//! | [`catalog`] | Knowledge-base catalog loading |
//! | [`analyzer`] | The `TicketAnalyzer` orchestrator |
//! | [`commands`] | CLI command implementations |
//!
//! The I/O-free algorithms live in the `ticket-triage-core` crate.

pub mod analyzer;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod embedding;

pub use analyzer::TicketAnalyzer;
pub use catalog::ArticleInput;
