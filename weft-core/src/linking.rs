//! Linking child sessions to the tool calls that spawned them
//!
//! Three phases run in order, each over what the previous ones left
//! unresolved:
//!
//! 1. **id**: the tool result names the child (`agentId`, or `member@team`
//!    for team spawns) and a process has that `parent_task_id`.
//! 2. **description**: a side-chain process whose first prompt equals the
//!    spawn's `prompt` or `description` input.
//! 3. **position**: remaining side-chain processes, by start time, paired
//!    with remaining non-team spawns in encounter order.
//!
//! Team members are never matched by position: a team spawn without an id
//! match stays unlinked.
//!
//! Each phase is a pure function from the unresolved sets to a list of
//! links plus what is still unresolved; [`link`] applies the result.

use crate::types::{Chunk, ChunkItem, SubagentProcess};
use serde::Serialize;
use std::sync::Arc;

/// Position of a tool item: chunk index, then item index within the chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    pub chunk: usize,
    pub item: usize,
}

/// The parts of a spawn item that linking looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnSite {
    pub at: ItemRef,
    pub tool_use_id: String,
    pub agent_ref: Option<String>,
    pub prompt: Option<String>,
    pub description: Option<String>,
    pub team: bool,
}

impl SpawnSite {
    fn mentions(&self, text: &str) -> bool {
        [self.prompt.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .any(|candidate| candidate.trim() == text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPhase {
    Id,
    Description,
    Position,
}

/// One resolved pair: `site` indexes the spawn sites, `process` the processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub site: usize,
    pub process: usize,
    pub phase: LinkPhase,
}

/// Indices still waiting for a partner, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unresolved {
    pub sites: Vec<usize>,
    pub processes: Vec<usize>,
}

impl Unresolved {
    fn all(sites: usize, processes: usize) -> Self {
        Self {
            sites: (0..sites).collect(),
            processes: (0..processes).collect(),
        }
    }

    fn take(&mut self, link: &Link) {
        self.sites.retain(|s| *s != link.site);
        self.processes.retain(|p| *p != link.process);
    }
}

/// Outcome summary of one linking pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub by_id: usize,
    pub by_description: usize,
    pub by_position: usize,
    /// Tool-use ids of spawn items left unlinked
    pub unresolved_items: Vec<String>,
    /// Ids of processes no spawn item claimed
    pub unresolved_processes: Vec<String>,
}

impl LinkReport {
    pub fn linked(&self) -> usize {
        self.by_id + self.by_description + self.by_position
    }
}

/// Collect the spawn items of `chunks` in encounter order.
pub fn spawn_sites(chunks: &[Chunk]) -> Vec<SpawnSite> {
    let mut sites = Vec::new();
    for (chunk_idx, chunk) in chunks.iter().enumerate() {
        let Some(ai) = chunk.as_ai() else {
            continue;
        };
        for (item_idx, item) in ai.items.iter().enumerate() {
            let ChunkItem::Tool(tool) = item else {
                continue;
            };
            if !tool.call.is_spawn() {
                continue;
            }
            sites.push(SpawnSite {
                at: ItemRef {
                    chunk: chunk_idx,
                    item: item_idx,
                },
                tool_use_id: tool.call.id.clone(),
                agent_ref: tool.agent_ref().map(str::to_string),
                prompt: tool.call.input_str("prompt").map(str::to_string),
                description: tool.call.input_str("description").map(str::to_string),
                team: tool.call.is_team_spawn(),
            });
        }
    }
    sites
}

/// Phase 1: exact id match against the tool result's child reference.
pub fn match_by_id(
    sites: &[SpawnSite],
    processes: &[Arc<SubagentProcess>],
    mut pending: Unresolved,
) -> (Vec<Link>, Unresolved) {
    let mut links = Vec::new();

    for site in pending.sites.clone() {
        let Some(agent_ref) = sites[site].agent_ref.as_deref() else {
            continue;
        };
        let found = pending
            .processes
            .iter()
            .copied()
            .find(|p| processes[*p].parent_task_id == agent_ref);
        if let Some(process) = found {
            let link = Link {
                site,
                process,
                phase: LinkPhase::Id,
            };
            pending.take(&link);
            links.push(link);
        }
    }

    (links, pending)
}

/// Phase 2: a side-chain process's first prompt equals the spawn input.
/// The first unresolved site in encounter order wins.
pub fn match_by_description(
    sites: &[SpawnSite],
    processes: &[Arc<SubagentProcess>],
    mut pending: Unresolved,
) -> (Vec<Link>, Unresolved) {
    let mut links = Vec::new();

    for process in pending.processes.clone() {
        if processes[process].is_team() {
            continue;
        }
        let Some(description) = processes[process].description.as_deref() else {
            continue;
        };
        let description = description.trim();
        if description.is_empty() {
            continue;
        }
        let found = pending
            .sites
            .iter()
            .copied()
            .find(|s| sites[*s].mentions(description));
        if let Some(site) = found {
            let link = Link {
                site,
                process,
                phase: LinkPhase::Description,
            };
            pending.take(&link);
            links.push(link);
        }
    }

    (links, pending)
}

/// Phase 3: side-chain processes by start time, paired with non-team spawns
/// in encounter order. Equal start times keep their existing order.
pub fn match_by_position(
    sites: &[SpawnSite],
    processes: &[Arc<SubagentProcess>],
    mut pending: Unresolved,
) -> (Vec<Link>, Unresolved) {
    let mut candidates: Vec<usize> = pending
        .processes
        .iter()
        .copied()
        .filter(|p| !processes[*p].is_team())
        .collect();
    candidates.sort_by_key(|p| processes[*p].start_time);

    let open_sites = pending.sites.iter().copied().filter(|s| !sites[*s].team);

    let links: Vec<Link> = open_sites
        .zip(candidates)
        .map(|(site, process)| Link {
            site,
            process,
            phase: LinkPhase::Position,
        })
        .collect();
    for link in &links {
        pending.take(link);
    }

    (links, pending)
}

/// Link `processes` into the spawn items of `chunks`.
///
/// Any previous links on the items are replaced.
pub fn link(chunks: &mut [Chunk], processes: &[Arc<SubagentProcess>]) -> LinkReport {
    let sites = spawn_sites(chunks);
    let pending = Unresolved::all(sites.len(), processes.len());

    let (by_id, pending) = match_by_id(&sites, processes, pending);
    let (by_description, pending) = match_by_description(&sites, processes, pending);
    let (by_position, pending) = match_by_position(&sites, processes, pending);

    for site in &sites {
        set_subagent(chunks, site.at, None);
    }
    for link in by_id.iter().chain(&by_description).chain(&by_position) {
        set_subagent(
            chunks,
            sites[link.site].at,
            Some(Arc::clone(&processes[link.process])),
        );
    }

    let report = LinkReport {
        by_id: by_id.len(),
        by_description: by_description.len(),
        by_position: by_position.len(),
        unresolved_items: pending
            .sites
            .iter()
            .map(|s| sites[*s].tool_use_id.clone())
            .collect(),
        unresolved_processes: pending
            .processes
            .iter()
            .map(|p| processes[*p].id.clone())
            .collect(),
    };

    tracing::debug!(
        by_id = report.by_id,
        by_description = report.by_description,
        by_position = report.by_position,
        unresolved_items = report.unresolved_items.len(),
        unresolved_processes = report.unresolved_processes.len(),
        "Linked child sessions"
    );

    report
}

fn set_subagent(chunks: &mut [Chunk], at: ItemRef, process: Option<Arc<SubagentProcess>>) {
    if let Some(Chunk::Ai(ai)) = chunks.get_mut(at.chunk) {
        if let Some(ChunkItem::Tool(tool)) = ai.items.get_mut(at.item) {
            tool.subagent = process;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AiChunk, ProcessOrigin, ToolCall, ToolItem, ToolOutcome};
    use chrono::{DateTime, Duration, Utc};
    use serde_json::{json, Value};
    use std::path::PathBuf;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::default() + Duration::seconds(secs)
    }

    fn spawn(id: &str, input: Value, agent_ref: Option<&str>) -> ChunkItem {
        let mut item = ToolItem::new(ToolCall {
            id: id.to_string(),
            name: "Task".to_string(),
            input,
        });
        item.result = agent_ref.map(|r| ToolOutcome {
            content: "done".to_string(),
            is_error: false,
            agent_ref: Some(r.to_string()),
        });
        ChunkItem::Tool(item)
    }

    fn ai_chunk(items: Vec<ChunkItem>) -> Chunk {
        Chunk::Ai(AiChunk {
            text: String::new(),
            thinking_count: 0,
            tool_calls: Vec::new(),
            items,
            usage: None,
            duration_ms: 0,
            model: None,
            started_at: ts(0),
            ended_at: ts(0),
        })
    }

    fn process(id: &str, origin: ProcessOrigin, description: &str, start: i64) -> Arc<SubagentProcess> {
        Arc::new(SubagentProcess {
            id: id.to_string(),
            parent_task_id: id.to_string(),
            origin,
            description: Some(description.to_string()),
            start_time: ts(start),
            usage: None,
            duration_ms: 0,
            chunks: Vec::new(),
            team_color: None,
            path: PathBuf::from(format!("/tmp/{id}.jsonl")),
        })
    }

    fn linked_id(chunks: &[Chunk], chunk: usize, item: usize) -> Option<String> {
        match &chunks[chunk].as_ai()?.items[item] {
            ChunkItem::Tool(tool) => tool.subagent.as_ref().map(|p| p.id.clone()),
            _ => None,
        }
    }

    #[test]
    fn test_id_match_takes_precedence() {
        let mut chunks = vec![ai_chunk(vec![
            spawn("t1", json!({"prompt": "explore"}), Some("bb")),
            spawn("t2", json!({"prompt": "explore"}), None),
        ])];
        let processes = vec![
            process("aa", ProcessOrigin::Sidechain, "explore", 1),
            process("bb", ProcessOrigin::Sidechain, "explore", 2),
        ];

        let report = link(&mut chunks, &processes);

        // t1 would match "aa" by description, but its id names "bb"
        assert_eq!(linked_id(&chunks, 0, 0).as_deref(), Some("bb"));
        assert_eq!(linked_id(&chunks, 0, 1).as_deref(), Some("aa"));
        assert_eq!(report.by_id, 1);
        assert_eq!(report.by_description, 1);
        assert_eq!(report.by_position, 0);
    }

    #[test]
    fn test_description_match_uses_prompt_or_description() {
        let mut chunks = vec![ai_chunk(vec![
            spawn("t1", json!({"description": "Audit deps", "prompt": "long prompt"}), None),
            spawn("t2", json!({"prompt": "  Write tests  "}), None),
        ])];
        let processes = vec![
            process("aa", ProcessOrigin::Sidechain, "Write tests", 1),
            process("bb", ProcessOrigin::Sidechain, "Audit deps", 2),
        ];

        let report = link(&mut chunks, &processes);

        assert_eq!(linked_id(&chunks, 0, 0).as_deref(), Some("bb"));
        assert_eq!(linked_id(&chunks, 0, 1).as_deref(), Some("aa"));
        assert_eq!(report.by_description, 2);
    }

    #[test]
    fn test_description_tie_goes_to_first_item() {
        let mut chunks = vec![
            ai_chunk(vec![spawn("t1", json!({"prompt": "same"}), None)]),
            ai_chunk(vec![spawn("t2", json!({"prompt": "same"}), None)]),
        ];
        let processes = vec![process("aa", ProcessOrigin::Sidechain, "same", 1)];

        let report = link(&mut chunks, &processes);

        assert_eq!(linked_id(&chunks, 0, 0).as_deref(), Some("aa"));
        assert_eq!(linked_id(&chunks, 1, 0), None);
        assert_eq!(report.unresolved_items, vec!["t2"]);
    }

    #[test]
    fn test_position_match_by_start_time() {
        let mut chunks = vec![ai_chunk(vec![
            spawn("t1", json!({"prompt": "a"}), None),
            spawn("t2", json!({"prompt": "b"}), None),
        ])];
        let processes = vec![
            process("late", ProcessOrigin::Sidechain, "x", 20),
            process("early", ProcessOrigin::Sidechain, "y", 10),
        ];

        let report = link(&mut chunks, &processes);

        assert_eq!(linked_id(&chunks, 0, 0).as_deref(), Some("early"));
        assert_eq!(linked_id(&chunks, 0, 1).as_deref(), Some("late"));
        assert_eq!(report.by_position, 2);
    }

    #[test]
    fn test_team_items_and_processes_never_matched_by_position() {
        let mut chunks = vec![ai_chunk(vec![
            spawn("team", json!({"team_name": "red", "name": "alice", "prompt": "p"}), None),
            spawn("plain", json!({"prompt": "q"}), None),
        ])];
        let processes = vec![
            process("alice@red", ProcessOrigin::Team, "something else", 1),
            process("s1", ProcessOrigin::Sidechain, "unrelated", 2),
        ];

        let report = link(&mut chunks, &processes);

        assert_eq!(linked_id(&chunks, 0, 0), None);
        assert_eq!(linked_id(&chunks, 0, 1).as_deref(), Some("s1"));
        assert_eq!(report.unresolved_items, vec!["team"]);
        assert_eq!(report.unresolved_processes, vec!["alice@red"]);
    }

    #[test]
    fn test_team_member_linked_by_composite_id() {
        let mut chunks = vec![ai_chunk(vec![spawn(
            "team",
            json!({"team_name": "red", "name": "alice"}),
            Some("alice@red"),
        )])];
        let processes = vec![process("alice@red", ProcessOrigin::Team, "hi", 1)];

        let report = link(&mut chunks, &processes);

        assert_eq!(linked_id(&chunks, 0, 0).as_deref(), Some("alice@red"));
        assert_eq!(report.by_id, 1);
        assert_eq!(report.linked(), 1);
    }

    #[test]
    fn test_each_process_linked_once() {
        let mut chunks = vec![ai_chunk(vec![
            spawn("t1", json!({}), Some("aa")),
            spawn("t2", json!({}), Some("aa")),
        ])];
        let processes = vec![process("aa", ProcessOrigin::Sidechain, "x", 1)];

        let report = link(&mut chunks, &processes);

        assert_eq!(report.linked(), 1);
        assert_eq!(linked_id(&chunks, 0, 1), None);
    }

    #[test]
    fn test_phase_functions_are_pure() {
        let sites = spawn_sites(&[ai_chunk(vec![spawn("t1", json!({}), Some("aa"))])]);
        let processes = vec![process("aa", ProcessOrigin::Sidechain, "x", 1)];
        let pending = Unresolved::all(sites.len(), processes.len());

        let first = match_by_id(&sites, &processes, pending.clone());
        let second = match_by_id(&sites, &processes, pending);
        assert_eq!(first, second);
        assert!(first.1.sites.is_empty());
    }
}
