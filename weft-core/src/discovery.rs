//! Child session discovery
//!
//! A parent session can have two kinds of children on disk:
//!
//! ```text
//! {dir}/{session}.jsonl                          parent
//! {dir}/{session}/subagents/agent-{hex}.jsonl    side-chain subagent
//! {dir}/{other}.jsonl                            team member (first record
//!                                                carries teamName + agentName)
//! ```
//!
//! Every pass scans from scratch and reads each sidecar in full; the result
//! replaces whatever the previous pass produced.

use crate::chunk::build_chunks;
use crate::error::{Error, Result};
use crate::ingest::{read_first_record, read_incremental, Origin, RawRecord};
use crate::paths::subagents_dir;
use crate::types::{Chunk, ProcessOrigin, SubagentProcess, Usage};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

const AGENT_PREFIX: &str = "agent-";

/// Discover every child session of `parent`, sorted by start time then id.
pub fn discover(parent: &Path) -> Result<Vec<SubagentProcess>> {
    let mut processes = Vec::new();

    for path in glob_files(&subagents_dir(parent), "agent-*.jsonl")? {
        let Some(key) = sidechain_key(&path) else {
            continue;
        };
        match peek_first(&path) {
            Some(first) if first.sidechain() => {
                if let Some(process) =
                    load_process(&path, key, ProcessOrigin::Sidechain, None, &first)
                {
                    processes.push(process);
                }
            }
            _ => tracing::debug!(path = %path.display(), "Not a side-chain log, skipping"),
        }
    }

    let dir = parent
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    for path in glob_files(dir, "*.jsonl")? {
        if path.file_name() == parent.file_name() {
            continue;
        }
        let Some(first) = peek_first(&path) else {
            continue;
        };
        if first.sidechain() {
            continue;
        }
        let Some(key) = first.team_member_key() else {
            continue;
        };
        let color = first.agent_color.clone();
        if let Some(process) = load_process(&path, key, ProcessOrigin::Team, color, &first) {
            processes.push(process);
        }
    }

    processes.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));

    tracing::debug!(
        parent = %parent.display(),
        found = processes.len(),
        "Discovered child sessions"
    );
    Ok(processes)
}

/// `agent-{hex}.jsonl` → `hex`. Other `agent-*` files are not subagents.
fn sidechain_key(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let key = stem.strip_prefix(AGENT_PREFIX)?;
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(key.to_string())
}

fn glob_files(dir: &Path, file_pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        file_pattern
    );
    let entries = glob::glob(&pattern).map_err(|e| Error::Parse {
        path: dir.to_path_buf(),
        message: format!("Invalid glob pattern: {}", e),
    })?;
    Ok(entries.flatten().filter(|p| p.is_file()).collect())
}

fn peek_first(path: &Path) -> Option<RawRecord> {
    match read_first_record(path) {
        Ok(first) => first,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read first record of sidecar");
            None
        }
    }
}

fn load_process(
    path: &Path,
    id: String,
    origin: ProcessOrigin,
    team_color: Option<String>,
    first: &RawRecord,
) -> Option<SubagentProcess> {
    let batch = match read_incremental(path, 0, Origin::Sidecar) {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read sidecar, skipping");
            return None;
        }
    };

    let first_ts = batch.messages.first().map(|m| m.timestamp());
    let last_ts = batch.messages.last().map(|m| m.timestamp());
    let start_time = first
        .parsed_timestamp()
        .or(first_ts)
        .unwrap_or_default();
    let duration_ms = match (first_ts, last_ts) {
        (Some(a), Some(b)) => span_ms(a, b),
        _ => 0,
    };

    let chunks = build_chunks(&batch.messages);

    Some(SubagentProcess {
        parent_task_id: id.clone(),
        id,
        origin,
        description: first_user_text(&chunks),
        start_time,
        usage: last_usage(&chunks),
        duration_ms,
        chunks,
        team_color,
        path: path.to_path_buf(),
    })
}

fn first_user_text(chunks: &[Chunk]) -> Option<String> {
    chunks.iter().find_map(|chunk| match chunk {
        Chunk::User(user) => Some(user.text.clone()),
        _ => None,
    })
}

fn last_usage(chunks: &[Chunk]) -> Option<Usage> {
    chunks.iter().rev().filter_map(Chunk::as_ai).find_map(|ai| ai.usage)
}

fn span_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}
