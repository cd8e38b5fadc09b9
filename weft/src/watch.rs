//! weft-watch - follow a session log as it grows
//!
//! Starts a live session on a log and prints one JSON summary line per
//! published snapshot until interrupted.
//!
//! File locations follow the XDG Base Directory layout:
//! - Logs: $XDG_STATE_HOME/weft/weft-watch.log.* (~/.local/state/weft/)
//! - Config: $XDG_CONFIG_HOME/weft/config.toml (~/.config/weft/config.toml)

mod output;

use anyhow::{Context, Result};
use clap::Parser;
use output::{to_json, SnapshotLine};
use std::path::PathBuf;
use tokio::sync::mpsc;
use weft_core::paths::find_session_log;
use weft_core::{Config, LiveSession};

#[derive(Parser)]
#[command(name = "weft-watch")]
#[command(about = "Follow a session log and print a summary per rebuild")]
#[command(version)]
struct Args {
    /// Path to the session JSONL file
    #[arg(required_unless_present = "session", conflicts_with = "session")]
    file: Option<PathBuf>,

    /// Look the log up by session id under the projects root
    #[arg(long)]
    session: Option<String>,

    /// Leave per-process details out of each line
    #[arg(long)]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        weft_core::logging::init(&config.logging, "weft-watch").context("failed to initialize logging")?;

    let path = resolve_path(&args, &config)?;
    tracing::info!(path = %path.display(), "weft-watch starting");

    let (interrupt_tx, mut interrupt_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })
    .context("failed to set Ctrl+C handler")?;

    let mut session = LiveSession::start(&path, config.live.clone())
        .with_context(|| format!("Failed to watch {}", path.display()))?;
    let mut errors = session.subscribe();

    eprintln!("Watching {} (Ctrl+C to stop)", path.display());

    loop {
        tokio::select! {
            _ = interrupt_rx.recv() => {
                tracing::info!("Interrupted");
                break;
            }
            snapshot = session.next_snapshot() => match snapshot {
                Some(snapshot) => {
                    let line = SnapshotLine::new(&snapshot, !args.compact);
                    println!("{}", to_json(&line, true)?);
                }
                None => break,
            },
            Some(error) = errors.next_error() => {
                eprintln!("Warning: {}", error);
            }
        }
    }

    session.stop().await;
    tracing::info!("weft-watch stopped");
    Ok(())
}

fn resolve_path(args: &Args, config: &Config) -> Result<PathBuf> {
    if let Some(file) = &args.file {
        return Ok(file.clone());
    }
    let session_id = args
        .session
        .as_deref()
        .context("either a FILE or --session is required")?;
    let root = config.projects_root();
    find_session_log(&root, session_id)
        .with_context(|| format!("No log for session {} under {}", session_id, root.display()))
}
