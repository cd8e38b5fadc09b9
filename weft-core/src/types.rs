//! Core domain types for weft
//!
//! These types are the pipeline's output model: classified messages, the
//! merged chunks built from them, and the child sessions linked into those
//! chunks.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Parent log** | The session's own append-only JSONL file |
//! | **Sidecar** | A separate JSONL file holding a child session's records |
//! | **Subagent** | A child session spawned by a `Task`/`Agent` tool call, stored under `subagents/` |
//! | **Teammate** | A team member session stored as a sibling file, keyed `member@team` |
//! | **Chunk** | A display unit folding one or more consecutive messages |
//! | **Spawn item** | A tool item whose call started a child session |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

// ============================================
// Usage
// ============================================

/// Token usage reported by one assistant response.
///
/// Figures are a point-in-time reading of the context window, so merged
/// chunks keep the latest snapshot instead of summing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl Usage {
    /// Tokens occupying the context window for this request.
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens + self.cache_creation_input_tokens + self.cache_read_input_tokens
    }
}

// ============================================
// Content blocks
// ============================================

/// One typed block of message content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

// ============================================
// Classified messages
// ============================================

/// A log record after classification.
///
/// Bookkeeping records never become a `ClassifiedMessage`; they are dropped
/// by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedMessage {
    /// A human turn.
    User {
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// Assistant output, or a tool-result echo written on the user side.
    Ai {
        blocks: Vec<ContentBlock>,
        model: Option<String>,
        usage: Option<Usage>,
        duration_hint: Option<u64>,
        timestamp: DateTime<Utc>,
        /// Set for user-side records that only carry tool results.
        tool_echo: bool,
        /// Child session identifier from the record's `toolUseResult`.
        agent_ref: Option<String>,
    },
    /// A system note.
    System {
        text: String,
        is_error: bool,
        timestamp: DateTime<Utc>,
    },
    /// A message relayed from a team member.
    Teammate {
        sender_id: String,
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// A compaction summary.
    Compact {
        summary_text: String,
        timestamp: DateTime<Utc>,
    },
}

impl ClassifiedMessage {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ClassifiedMessage::User { timestamp, .. }
            | ClassifiedMessage::Ai { timestamp, .. }
            | ClassifiedMessage::System { timestamp, .. }
            | ClassifiedMessage::Teammate { timestamp, .. }
            | ClassifiedMessage::Compact { timestamp, .. } => *timestamp,
        }
    }

    /// Stamp a message whose record carried no timestamp of its own.
    pub(crate) fn set_timestamp(&mut self, ts: DateTime<Utc>) {
        match self {
            ClassifiedMessage::User { timestamp, .. }
            | ClassifiedMessage::Ai { timestamp, .. }
            | ClassifiedMessage::System { timestamp, .. }
            | ClassifiedMessage::Teammate { timestamp, .. }
            | ClassifiedMessage::Compact { timestamp, .. } => *timestamp = ts,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            ClassifiedMessage::User { .. } => "user",
            ClassifiedMessage::Ai { .. } => "ai",
            ClassifiedMessage::System { .. } => "system",
            ClassifiedMessage::Teammate { .. } => "teammate",
            ClassifiedMessage::Compact { .. } => "compact",
        }
    }
}

// ============================================
// Chunks
// ============================================

/// A tool invocation inside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl ToolCall {
    /// Tool names that start a child session.
    pub const SPAWN_TOOLS: [&'static str; 2] = ["Task", "Agent"];

    pub fn is_spawn(&self) -> bool {
        Self::SPAWN_TOOLS.contains(&self.name.as_str())
    }

    /// Spawns that name a team carry an explicit `member@team` identity.
    pub fn is_team_spawn(&self) -> bool {
        self.is_spawn() && self.input_str("team_name").is_some()
    }

    /// String field from the call input, if present and non-empty.
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Result of a tool call, attached once the echo arrives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
    /// Child session identifier reported by the tool (hex id or `member@team`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_ref: Option<String>,
}

/// A tool call plus everything later attached to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolItem {
    pub call: ToolCall,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolOutcome>,
    /// Child session linked to this spawn item, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subagent: Option<Arc<SubagentProcess>>,
}

impl ToolItem {
    pub fn new(call: ToolCall) -> Self {
        Self {
            call,
            result: None,
            subagent: None,
        }
    }

    pub fn agent_ref(&self) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.agent_ref.as_deref())
    }
}

/// Ordered display items of an assistant chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ChunkItem {
    Text(String),
    Thinking(String),
    Tool(ToolItem),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserChunk {
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// Sender id when the turn was relayed from a team member.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teammate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiChunk {
    pub text: String,
    pub thinking_count: usize,
    pub tool_calls: Vec<ToolCall>,
    pub items: Vec<ChunkItem>,
    pub usage: Option<Usage>,
    pub duration_ms: u64,
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl AiChunk {
    pub fn tool_items(&self) -> impl Iterator<Item = &ToolItem> {
        self.items.iter().filter_map(|item| match item {
            ChunkItem::Tool(tool) => Some(tool),
            _ => None,
        })
    }

    pub fn spawn_items(&self) -> impl Iterator<Item = &ToolItem> {
        self.tool_items().filter(|tool| tool.call.is_spawn())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemChunk {
    pub text: String,
    pub is_error: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactChunk {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A merged, display-ready unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chunk {
    User(UserChunk),
    Ai(AiChunk),
    System(SystemChunk),
    Compact(CompactChunk),
}

impl Chunk {
    pub fn as_ai(&self) -> Option<&AiChunk> {
        match self {
            Chunk::Ai(ai) => Some(ai),
            _ => None,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Chunk::User(_) => "user",
            Chunk::Ai(_) => "ai",
            Chunk::System(_) => "system",
            Chunk::Compact(_) => "compact",
        }
    }
}

// ============================================
// Child sessions
// ============================================

/// Where a child session's sidecar was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOrigin {
    /// `{session}/subagents/agent-{hex}.jsonl`, side-chain flagged.
    Sidechain,
    /// Sibling `.jsonl` whose first record names a team and member.
    Team,
}

impl ProcessOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOrigin::Sidechain => "sidechain",
            ProcessOrigin::Team => "team",
        }
    }
}

impl std::fmt::Display for ProcessOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A discovered child session with its own chunk sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubagentProcess {
    /// Hex id for sidechain sessions, `member@team` for teammates.
    pub id: String,
    /// Identifier the parent's tool result uses to name this child.
    pub parent_task_id: String,
    pub origin: ProcessOrigin,
    /// First prompt the child received.
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub usage: Option<Usage>,
    pub duration_ms: u64,
    pub chunks: Vec<Chunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_color: Option<String>,
    pub path: PathBuf,
}

impl SubagentProcess {
    pub fn is_team(&self) -> bool {
        self.origin == ProcessOrigin::Team
    }
}
