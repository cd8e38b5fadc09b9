//! JSON output shapes shared by the weft binaries

// Each binary uses a different subset.
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use weft_core::ingest::SessionMeta;
use weft_core::{Chunk, LinkReport, Snapshot, SubagentProcess};

/// Session metadata read from the log itself
#[derive(Serialize)]
pub struct SessionInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl From<SessionMeta> for SessionInfo {
    fn from(meta: SessionMeta) -> Self {
        Self {
            session_id: meta.session_id,
            cwd: meta.cwd.map(|p| p.display().to_string()),
            git_branch: meta.git_branch,
            version: meta.version,
        }
    }
}

/// A child session without its chunks
#[derive(Serialize)]
pub struct ProcessSummary {
    pub id: String,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub chunk_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_color: Option<String>,
    pub path: String,
}

impl From<&SubagentProcess> for ProcessSummary {
    fn from(process: &SubagentProcess) -> Self {
        Self {
            id: process.id.clone(),
            origin: process.origin.to_string(),
            description: process.description.clone(),
            start_time: process.start_time,
            duration_ms: process.duration_ms,
            chunk_count: process.chunks.len(),
            context_tokens: process.usage.map(|u| u.context_tokens()),
            team_color: process.team_color.clone(),
            path: process.path.display().to_string(),
        }
    }
}

pub fn summarize_processes(processes: &[Arc<SubagentProcess>]) -> Vec<ProcessSummary> {
    processes
        .iter()
        .map(|p| ProcessSummary::from(p.as_ref()))
        .collect()
}

/// Summary statistics over a chunk sequence
#[derive(Serialize)]
pub struct Stats {
    pub chunk_count: usize,
    pub by_kind: BTreeMap<String, usize>,
    pub tool_calls: usize,
    pub thinking_blocks: usize,
    pub spawn_items: usize,
    pub linked_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<u64>,
}

pub fn compute_stats(chunks: &[Chunk]) -> Stats {
    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    let mut tool_calls = 0;
    let mut thinking_blocks = 0;
    let mut spawn_items = 0;
    let mut linked_items = 0;
    let mut context_tokens = None;

    for chunk in chunks {
        *by_kind.entry(chunk.kind_str().to_string()).or_insert(0) += 1;

        if let Some(ai) = chunk.as_ai() {
            tool_calls += ai.tool_calls.len();
            thinking_blocks += ai.thinking_count;
            for item in ai.spawn_items() {
                spawn_items += 1;
                if item.subagent.is_some() {
                    linked_items += 1;
                }
            }
            if let Some(usage) = ai.usage {
                context_tokens = Some(usage.context_tokens());
            }
        }
    }

    Stats {
        chunk_count: chunks.len(),
        by_kind,
        tool_calls,
        thinking_blocks,
        spawn_items,
        linked_items,
        context_tokens,
    }
}

/// One line of `weft-watch` output
#[derive(Serialize)]
pub struct SnapshotLine {
    pub generation: u64,
    pub observed_at: DateTime<Utc>,
    pub offset: u64,
    pub has_team_spawns: bool,
    pub stats: Stats,
    pub link_report: LinkReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<ProcessSummary>,
}

impl SnapshotLine {
    pub fn new(snapshot: &Snapshot, with_processes: bool) -> Self {
        Self {
            generation: snapshot.generation,
            observed_at: Utc::now(),
            offset: snapshot.offset,
            has_team_spawns: snapshot.has_team_spawns,
            stats: compute_stats(&snapshot.chunks),
            link_report: snapshot.link_report.clone(),
            processes: if with_processes {
                summarize_processes(&snapshot.processes)
            } else {
                Vec::new()
            },
        }
    }
}

pub fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(json)
}
