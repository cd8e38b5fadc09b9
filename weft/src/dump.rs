//! weft-dump - one-shot view of a session log
//!
//! Reads a session log, builds its chunks, discovers and links child
//! sessions, and prints the result as JSON.

mod output;

use anyhow::{Context, Result};
use clap::Parser;
use output::{compute_stats, summarize_processes, to_json, ProcessSummary, SessionInfo, Stats};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use weft_core::ingest::{read_session_meta, Origin};
use weft_core::{build_chunks, discover, link, read_incremental, Chunk, Config, LinkReport};

#[derive(Parser)]
#[command(name = "weft-dump")]
#[command(about = "Print the linked chunk sequence of a session log as JSON")]
#[command(version)]
struct Args {
    /// Path to the session JSONL file
    file: PathBuf,

    /// Compact JSON output (default: pretty)
    #[arg(long)]
    compact: bool,

    /// Show only summary statistics (no chunks)
    #[arg(long)]
    summary: bool,

    /// Skip child session discovery and linking
    #[arg(long)]
    no_link: bool,
}

#[derive(Serialize)]
struct DumpOutput {
    file: String,
    session: SessionInfo,
    offset: u64,
    skipped_lines: usize,
    stats: Stats,
    #[serde(skip_serializing_if = "Option::is_none")]
    link_report: Option<LinkReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    processes: Vec<ProcessSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    chunks: Vec<Chunk>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        weft_core::logging::init(&config.logging, "weft-dump").context("failed to initialize logging")?;

    let output = dump(&args)?;
    println!("{}", to_json(&output, args.compact)?);
    Ok(())
}

fn dump(args: &Args) -> Result<DumpOutput> {
    let file = &args.file;
    tracing::info!(file = %file.display(), "weft-dump starting");

    let batch = read_incremental(file, 0, Origin::Parent)
        .with_context(|| format!("Failed to read: {}", file.display()))?;
    let meta = read_session_meta(file)
        .with_context(|| format!("Failed to read session metadata: {}", file.display()))?;

    let mut chunks = build_chunks(&batch.messages);

    let (processes, link_report) = if args.no_link {
        (Vec::new(), None)
    } else {
        let processes: Vec<_> = discover(file)
            .with_context(|| format!("Failed to discover child sessions of {}", file.display()))?
            .into_iter()
            .map(Arc::new)
            .collect();
        let report = link(&mut chunks, &processes);
        (processes, Some(report))
    };

    Ok(DumpOutput {
        file: file.display().to_string(),
        session: meta.into(),
        offset: batch.offset,
        skipped_lines: batch.skipped_lines,
        stats: compute_stats(&chunks),
        link_report,
        processes: summarize_processes(&processes),
        chunks: if args.summary { Vec::new() } else { chunks },
    })
}
