//! Raw JSONL record types (serde deserialization)
//!
//! One line of a session log decodes into a [`RawRecord`]. Decoding is
//! deliberately lenient: every field defaults, unknown fields are ignored,
//! and unknown content block types fall into a catch-all variant.

use crate::types::Usage;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Represents a single line from a session JSONL log.
///
/// Uses `#[serde(default)]` liberally to handle missing fields gracefully.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRecord {
    /// Record kind: `user`, `assistant`, `system`, `summary`,
    /// `file-history-snapshot`, ...
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "uuid")]
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub is_sidechain: Option<bool>,
    pub is_meta: Option<bool>,
    pub is_compact_summary: Option<bool>,

    pub message: Option<RawMessage>,

    // System records
    pub subtype: Option<String>,
    pub level: Option<String>,
    pub content: Option<serde_json::Value>,

    // Summary records
    pub summary: Option<String>,

    // Child-session identity (team sidecar files)
    pub team_name: Option<String>,
    pub agent_name: Option<String>,
    pub agent_color: Option<String>,

    // Session metadata
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    pub version: Option<String>,

    pub duration_ms: Option<f64>,

    /// Structured tool result (for user-side tool echoes)
    pub tool_use_result: Option<serde_json::Value>,
}

impl RawRecord {
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("unknown")
    }

    pub fn sidechain(&self) -> bool {
        self.is_sidechain.unwrap_or(false)
    }

    pub fn meta(&self) -> bool {
        self.is_meta.unwrap_or(false)
    }

    pub fn compact_summary(&self) -> bool {
        self.is_compact_summary.unwrap_or(false)
    }

    /// Top-level `content` of system records, as text.
    pub fn system_text(&self) -> Option<String> {
        self.content
            .as_ref()
            .map(tool_result_text)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn duration_hint(&self) -> Option<u64> {
        self.duration_ms
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.round() as u64)
    }

    /// Parsed timestamp, if present and valid RFC 3339.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// `member@team` when the record carries both team identity fields.
    pub fn team_member_key(&self) -> Option<String> {
        let team = self.team_name.as_deref().filter(|s| !s.is_empty())?;
        let member = self.agent_name.as_deref().filter(|s| !s.is_empty())?;
        Some(format!("{member}@{team}"))
    }

    /// Child-session identifier reported in `toolUseResult`.
    ///
    /// Task results carry `agentId` (hex); team spawns report the composite
    /// `member@team` under `teammate_id` or `agent_id`.
    pub fn agent_ref(&self) -> Option<String> {
        let result = self.tool_use_result.as_ref()?;
        ["agentId", "teammate_id", "agent_id"]
            .iter()
            .find_map(|key| result.get(*key).and_then(|v| v.as_str()))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RawMessage {
    pub role: Option<String>,
    pub model: Option<String>,
    pub content: Option<RawContent>,
    pub usage: Option<RawUsage>,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum RawContent {
    Text(String),
    Blocks(Vec<RawBlock>),
}

impl Default for RawContent {
    fn default() -> Self {
        RawContent::Text(String::new())
    }
}

/// One content block.
///
/// Fields are optional so that a block with a missing or `null` field is
/// dropped on its own instead of failing the whole record.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum RawBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: Option<String>,
    },
    #[serde(rename = "redacted_thinking")]
    RedactedThinking,
    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(rename = "image")]
    Image,
    // Catch-all for unknown block types
    #[serde(other)]
    Unknown,
}

impl RawBlock {
    /// Non-blank text of a `text` block.
    pub fn text(&self) -> Option<&str> {
        match self {
            RawBlock::Text { text: Some(text) } if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RawUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
}

impl From<&RawUsage> for Usage {
    fn from(raw: &RawUsage) -> Self {
        Usage {
            input_tokens: raw.input_tokens.unwrap_or(0),
            output_tokens: raw.output_tokens.unwrap_or(0),
            cache_creation_input_tokens: raw.cache_creation_input_tokens.unwrap_or(0),
            cache_read_input_tokens: raw.cache_read_input_tokens.unwrap_or(0),
        }
    }
}

/// Flatten tool result content to display text.
///
/// Results are either a plain string or a list of `{type: "text", text}`
/// blocks; anything else is rendered as compact JSON.
pub fn tool_result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect();
            if texts.len() == parts.len() {
                texts.join("\n")
            } else {
                content.to_string()
            }
        }
        v => v.to_string(),
    }
}

/// Decode one log line.
///
/// Returns `None` for blank lines and for anything that is not a JSON
/// object of the expected shape; a malformed line never aborts the file.
pub fn decode_line(line: &str) -> Option<RawRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<RawRecord>(line) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed log line");
            None
        }
    }
}
