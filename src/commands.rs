//! CLI command implementations for the `triage` binary.
//!
//! Results are written to stdout as JSON, one document per line unless
//! `--pretty` is given. Logs go to stderr, so stdout can be piped into
//! other tools unchanged.

use anyhow::{Context, Result};
use serde_json::json;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use ticket_triage_core::TriageError;

use crate::analyzer::TicketAnalyzer;

/// Read a file, or stdin when `input` is `-`.
fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(Path::new(input))
            .with_context(|| format!("Failed to read input file: {}", input))
    }
}

/// `triage analyze`: one ticket, one JSON result.
pub fn run_analyze(
    analyzer: &TicketAnalyzer,
    text: &str,
    source: Option<&str>,
    pretty: bool,
) -> Result<()> {
    let text = if text == "-" {
        read_input("-")?
    } else {
        text.to_string()
    };
    let result = analyzer.analyze(&text, source)?;
    let out = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", out);
    Ok(())
}

/// `triage recommend`: knowledge-base articles for a text, without
/// counting it as an analysed ticket.
pub fn run_recommend(
    analyzer: &TicketAnalyzer,
    text: &str,
    top: Option<usize>,
    pretty: bool,
) -> Result<()> {
    let text = if text == "-" {
        read_input("-")?
    } else {
        text.to_string()
    };
    let recs = analyzer.recommend(&text, top)?;
    let out = if pretty {
        serde_json::to_string_pretty(&recs)?
    } else {
        serde_json::to_string(&recs)?
    };
    println!("{}", out);
    Ok(())
}

/// Split batch input into tickets: one per non-empty line.
pub fn ticket_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// `triage batch`: analyse every line concurrently on the blocking pool,
/// at most `workers` at a time, and print results in input order followed
/// by the usage summary and, optionally, a fresh topic run.
pub async fn run_batch(
    analyzer: Arc<TicketAnalyzer>,
    input: &str,
    source: Option<String>,
    workers: usize,
    topics: bool,
) -> Result<()> {
    let lines = ticket_lines(&read_input(input)?);
    let total = lines.len();
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut set = JoinSet::new();

    for (position, line) in lines.into_iter().enumerate() {
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        let analyzer = Arc::clone(&analyzer);
        let source = source.clone();
        set.spawn_blocking(move || {
            let _permit = permit;
            (position, analyzer.analyze(&line, source.as_deref()))
        });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        results.push(joined.context("analysis task panicked")?);
    }
    results.sort_by_key(|(position, _)| *position);

    for (position, result) in results {
        match result {
            Ok(analysis) => println!("{}", serde_json::to_string(&analysis)?),
            Err(TriageError::EmptyInput) => {
                warn!(line = position + 1, "skipping ticket with no meaningful text");
            }
            Err(e) => return Err(e).with_context(|| format!("ticket {} failed", position + 1)),
        }
    }

    println!(
        "{}",
        serde_json::to_string(&json!({ "usage": analyzer.usage_summary() }))?
    );

    if topics {
        let run = analyzer.refresh_topics();
        println!(
            "{}",
            serde_json::to_string(&json!({
                "topics": run.as_ref(),
                "content_gaps": analyzer.content_gaps(),
            }))?
        );
    }

    Ok(())
}

/// `triage model`: model descriptor and index statistics.
pub fn run_model(analyzer: &TicketAnalyzer) -> Result<()> {
    let out = json!({
        "model_info": analyzer.model_info(),
        "index": analyzer.index_stats(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
