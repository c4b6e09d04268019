//! # Ticket Triage CLI (`triage`)
//!
//! ## Usage
//!
//! ```bash
//! triage [--config ./config/triage.toml] [--kb ./kb.json] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `triage analyze "<text>"` | Analyse one ticket and print the result as JSON |
//! | `triage recommend "<text>"` | Knowledge-base articles for a text, without analysis |
//! | `triage batch <file>` | Analyse one ticket per line, then print usage (and topics) |
//! | `triage model` | Show the embedding model and knowledge index stats |
//!
//! ## Examples
//!
//! ```bash
//! # Offline analysis with the default hashing embedder
//! triage --kb ./kb.json analyze "The app crashed and login is not working"
//!
//! # Batch from stdin with topic clustering
//! cat tickets.txt | triage --kb ./kb.json batch - --workers 8 --topics
//! ```
//!
//! Set `RUST_LOG=debug` for per-ticket logs on stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ticket_triage::catalog::load_catalog;
use ticket_triage::commands;
use ticket_triage::config::{load_config, Config};
use ticket_triage::TicketAnalyzer;

/// Ticket Triage: support ticket classification and knowledge-base
/// recommendations.
#[derive(Parser)]
#[command(name = "triage", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Knowledge-base catalog (JSON array of articles) to index at startup.
    #[arg(long, global = true)]
    kb: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a single ticket.
    Analyze {
        /// Ticket text, or `-` to read it from stdin.
        text: String,

        /// Channel the ticket arrived on (e.g. `email`, `chat`).
        #[arg(long)]
        source: Option<String>,

        /// Pretty-print the JSON result.
        #[arg(long)]
        pretty: bool,
    },

    /// Recommend knowledge-base articles for a text. Usage is not recorded.
    Recommend {
        /// Query text, or `-` to read it from stdin.
        text: String,

        /// Number of articles to return (defaults to `retrieval.top_n`).
        #[arg(long)]
        top: Option<usize>,

        /// Pretty-print the JSON result.
        #[arg(long)]
        pretty: bool,
    },

    /// Analyse one ticket per non-empty line of a file.
    Batch {
        /// Input file, or `-` for stdin.
        input: String,

        /// Source label applied to every ticket.
        #[arg(long)]
        source: Option<String>,

        /// Maximum number of tickets analysed concurrently.
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Cluster the batch into topics after analysis.
        #[arg(long)]
        topics: bool,
    },

    /// Show embedding model info and knowledge index stats.
    Model,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    let analyzer = Arc::new(TicketAnalyzer::from_config(&cfg)?);
    if let Some(kb) = &cli.kb {
        let articles = load_catalog(kb)?;
        analyzer.rebuild_knowledge_index(&articles)?;
    }

    match cli.command {
        Commands::Analyze {
            text,
            source,
            pretty,
        } => {
            commands::run_analyze(&analyzer, &text, source.as_deref(), pretty)?;
        }
        Commands::Recommend { text, top, pretty } => {
            commands::run_recommend(&analyzer, &text, top, pretty)?;
        }
        Commands::Batch {
            input,
            source,
            workers,
            topics,
        } => {
            commands::run_batch(Arc::clone(&analyzer), &input, source, workers, topics).await?;
        }
        Commands::Model => {
            commands::run_model(&analyzer)?;
        }
    }

    Ok(())
}
