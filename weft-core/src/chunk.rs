//! Chunk construction
//!
//! Folds the full classified-message sequence of a session into display
//! chunks. Consecutive AI messages (assistant output and the tool-result
//! echoes between them) merge into one [`AiChunk`]; every other message
//! opens its own chunk and closes any open AI run.
//!
//! The builder always consumes the *entire* sequence: appending one more AI
//! message to a session grows the last chunk rather than adding a new one,
//! so a delta on its own is meaningless.
//!
//! Merge arithmetic:
//! - tool calls and thinking blocks are summed across merged messages
//! - `usage` is replaced by the newest snapshot (usage figures are already
//!   cumulative context readings)
//! - `model` is the newest model seen

use crate::types::{
    AiChunk, Chunk, ChunkItem, ClassifiedMessage, CompactChunk, ContentBlock, SystemChunk,
    ToolCall, ToolItem, ToolOutcome, UserChunk,
};
use chrono::{DateTime, Utc};

/// Build the chunk sequence for a full message history. O(n).
pub fn build_chunks(messages: &[ClassifiedMessage]) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    // Sum of duration hints of the open AI chunk
    let mut hint_total: u64 = 0;

    for message in messages {
        match message {
            ClassifiedMessage::Ai {
                blocks,
                model,
                usage,
                duration_hint,
                timestamp,
                tool_echo,
                agent_ref,
            } => {
                if !matches!(chunks.last(), Some(Chunk::Ai(_))) {
                    if *tool_echo {
                        // Results with no open call have nothing to attach to.
                        tracing::trace!(%timestamp, "Dropping tool echo outside an assistant run");
                        continue;
                    }
                    hint_total = 0;
                    chunks.push(Chunk::Ai(empty_ai_chunk(*timestamp)));
                }
                let Some(Chunk::Ai(ai)) = chunks.last_mut() else {
                    continue;
                };

                for block in blocks {
                    append_block(ai, block, agent_ref.as_deref());
                }
                if usage.is_some() {
                    ai.usage = *usage;
                }
                if model.is_some() {
                    ai.model = model.clone();
                }
                if *timestamp > ai.ended_at {
                    ai.ended_at = *timestamp;
                }
                hint_total += duration_hint.unwrap_or(0);
                ai.duration_ms = span_ms(ai.started_at, ai.ended_at).max(hint_total);
            }
            ClassifiedMessage::User { text, timestamp } => {
                chunks.push(Chunk::User(UserChunk {
                    text: text.clone(),
                    timestamp: *timestamp,
                    teammate: None,
                }));
            }
            ClassifiedMessage::Teammate {
                sender_id,
                text,
                timestamp,
            } => {
                chunks.push(Chunk::User(UserChunk {
                    text: text.clone(),
                    timestamp: *timestamp,
                    teammate: Some(sender_id.clone()),
                }));
            }
            ClassifiedMessage::System {
                text,
                is_error,
                timestamp,
            } => {
                chunks.push(Chunk::System(SystemChunk {
                    text: text.clone(),
                    is_error: *is_error,
                    timestamp: *timestamp,
                }));
            }
            ClassifiedMessage::Compact {
                summary_text,
                timestamp,
            } => {
                chunks.push(Chunk::Compact(CompactChunk {
                    text: summary_text.clone(),
                    timestamp: *timestamp,
                }));
            }
        }
    }

    chunks
}

/// Whether any assistant chunk spawned a team member.
pub fn has_team_spawns(chunks: &[Chunk]) -> bool {
    chunks
        .iter()
        .filter_map(Chunk::as_ai)
        .flat_map(AiChunk::spawn_items)
        .any(|item| item.call.is_team_spawn())
}

fn empty_ai_chunk(timestamp: DateTime<Utc>) -> AiChunk {
    AiChunk {
        text: String::new(),
        thinking_count: 0,
        tool_calls: Vec::new(),
        items: Vec::new(),
        usage: None,
        duration_ms: 0,
        model: None,
        started_at: timestamp,
        ended_at: timestamp,
    }
}

fn append_block(ai: &mut AiChunk, block: &ContentBlock, agent_ref: Option<&str>) {
    match block {
        ContentBlock::Text { text } => {
            if !ai.text.is_empty() {
                ai.text.push_str("\n\n");
            }
            ai.text.push_str(text.trim());
            ai.items.push(ChunkItem::Text(text.clone()));
        }
        ContentBlock::Thinking { thinking } => {
            ai.thinking_count += 1;
            ai.items.push(ChunkItem::Thinking(thinking.clone()));
        }
        ContentBlock::ToolUse { id, name, input } => {
            let call = ToolCall {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            };
            ai.tool_calls.push(call.clone());
            ai.items.push(ChunkItem::Tool(ToolItem::new(call)));
        }
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let target = ai.items.iter_mut().rev().find_map(|item| match item {
                ChunkItem::Tool(tool) if tool.call.id == *tool_use_id => Some(tool),
                _ => None,
            });
            match target {
                Some(tool) => {
                    tool.result = Some(ToolOutcome {
                        content: content.clone(),
                        is_error: *is_error,
                        agent_ref: agent_ref.map(str::to_string),
                    });
                }
                None => {
                    tracing::trace!(tool_use_id = %tool_use_id, "Tool result without a matching call");
                }
            }
        }
    }
}

fn span_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Usage;
    use chrono::Duration;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::default() + Duration::seconds(secs)
    }

    fn user(text: &str, at: i64) -> ClassifiedMessage {
        ClassifiedMessage::User {
            text: text.to_string(),
            timestamp: ts(at),
        }
    }

    fn tool_use(id: &str, name: &str) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.to_string(),
            name: name.to_string(),
            input: json!({}),
        }
    }

    fn ai(blocks: Vec<ContentBlock>, usage: Option<Usage>, at: i64) -> ClassifiedMessage {
        ClassifiedMessage::Ai {
            blocks,
            model: Some("claude-sonnet-4".to_string()),
            usage,
            duration_hint: None,
            timestamp: ts(at),
            tool_echo: false,
            agent_ref: None,
        }
    }

    fn echo(tool_use_id: &str, content: &str, agent_ref: Option<&str>, at: i64) -> ClassifiedMessage {
        ClassifiedMessage::Ai {
            blocks: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.to_string(),
                content: content.to_string(),
                is_error: false,
            }],
            model: None,
            usage: None,
            duration_hint: None,
            timestamp: ts(at),
            tool_echo: true,
            agent_ref: agent_ref.map(str::to_string),
        }
    }

    fn usage(input: u64, output: u64) -> Usage {
        Usage {
            input_tokens: input,
            output_tokens: output,
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_sums_tool_calls_and_keeps_last_usage() {
        let messages = vec![
            user("go", 0),
            ai(
                vec![tool_use("a", "Read"), tool_use("b", "Grep")],
                Some(usage(100, 10)),
                1,
            ),
            ai(
                vec![tool_use("c", "Edit"), tool_use("d", "Bash"), tool_use("e", "Bash")],
                Some(usage(250, 30)),
                2,
            ),
        ];
        let chunks = build_chunks(&messages);

        assert_eq!(chunks.len(), 2);
        let ai = chunks[1].as_ai().unwrap();
        assert_eq!(ai.tool_calls.len(), 5);
        assert_eq!(ai.usage, Some(usage(250, 30)));
    }

    #[test]
    fn test_non_ai_message_breaks_run() {
        let messages = vec![
            ai(vec![ContentBlock::Text { text: "one".into() }], None, 0),
            user("interrupt", 1),
            ai(vec![ContentBlock::Text { text: "two".into() }], None, 2),
            ClassifiedMessage::System {
                text: "note".into(),
                is_error: false,
                timestamp: ts(3),
            },
            ai(vec![ContentBlock::Text { text: "three".into() }], None, 4),
        ];
        let kinds: Vec<_> = build_chunks(&messages).iter().map(Chunk::kind_str).collect();
        assert_eq!(kinds, vec!["ai", "user", "ai", "system", "ai"]);
    }

    #[test]
    fn test_thinking_counts_summed_and_text_joined() {
        let messages = vec![
            ai(
                vec![
                    ContentBlock::Thinking { thinking: "a".into() },
                    ContentBlock::Text { text: "first".into() },
                ],
                None,
                0,
            ),
            ai(
                vec![
                    ContentBlock::Thinking { thinking: "b".into() },
                    ContentBlock::Text { text: "second".into() },
                ],
                None,
                1,
            ),
        ];
        let chunks = build_chunks(&messages);
        let ai = chunks[0].as_ai().unwrap();

        assert_eq!(ai.thinking_count, 2);
        assert_eq!(ai.text, "first\n\nsecond");
        assert_eq!(ai.items.len(), 4);
    }

    #[test]
    fn test_tool_echo_attaches_result_and_keeps_run_open() {
        let messages = vec![
            ai(vec![tool_use("t1", "Task")], Some(usage(10, 1)), 0),
            echo("t1", "agent finished", Some("a1b2c3"), 5),
            ai(vec![ContentBlock::Text { text: "done".into() }], None, 6),
        ];
        let chunks = build_chunks(&messages);

        assert_eq!(chunks.len(), 1);
        let ai = chunks[0].as_ai().unwrap();
        let spawn = ai.spawn_items().next().unwrap();
        let result = spawn.result.as_ref().unwrap();
        assert_eq!(result.content, "agent finished");
        assert_eq!(spawn.agent_ref(), Some("a1b2c3"));
        // Echo carried no usage, so the snapshot survives
        assert_eq!(ai.usage, Some(usage(10, 1)));
        assert_eq!(ai.duration_ms, 6_000);
    }

    #[test]
    fn test_orphan_echo_dropped() {
        let messages = vec![user("hi", 0), echo("missing", "x", None, 1)];
        let chunks = build_chunks(&messages);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_appending_grows_existing_chunk() {
        let messages = vec![
            user("go", 0),
            ai(vec![tool_use("a", "Read")], None, 1),
            ai(vec![tool_use("b", "Read")], None, 2),
        ];
        let before = build_chunks(&messages[..2]);
        let after = build_chunks(&messages);

        assert_eq!(before.len(), after.len());
        assert_eq!(before[1].as_ai().unwrap().tool_calls.len(), 1);
        assert_eq!(after[1].as_ai().unwrap().tool_calls.len(), 2);
    }

    #[test]
    fn test_duration_hints_win_when_larger() {
        let mut first = ai(vec![ContentBlock::Text { text: "x".into() }], None, 0);
        if let ClassifiedMessage::Ai { duration_hint, .. } = &mut first {
            *duration_hint = Some(90_000);
        }
        let chunks = build_chunks(&[first, ai(vec![ContentBlock::Text { text: "y".into() }], None, 2)]);
        assert_eq!(chunks[0].as_ai().unwrap().duration_ms, 90_000);
    }

    #[test]
    fn test_teammate_and_compact_chunks() {
        let messages = vec![
            ClassifiedMessage::Teammate {
                sender_id: "alice@red".into(),
                text: "ready".into(),
                timestamp: ts(0),
            },
            ClassifiedMessage::Compact {
                summary_text: "summary".into(),
                timestamp: ts(1),
            },
        ];
        let chunks = build_chunks(&messages);

        match &chunks[0] {
            Chunk::User(user) => assert_eq!(user.teammate.as_deref(), Some("alice@red")),
            other => panic!("expected user chunk, got {:?}", other),
        }
        assert!(matches!(chunks[1], Chunk::Compact(_)));
    }

    #[test]
    fn test_has_team_spawns() {
        let plain = vec![ai(vec![tool_use("t1", "Task")], None, 0)];
        assert!(!has_team_spawns(&build_chunks(&plain)));

        let team = vec![ai(
            vec![ContentBlock::ToolUse {
                id: "t2".into(),
                name: "Task".into(),
                input: json!({"team_name": "red", "name": "alice"}),
            }],
            None,
            0,
        )];
        assert!(has_team_spawns(&build_chunks(&team)));
    }

    #[test]
    fn test_empty_input() {
        assert!(build_chunks(&[]).is_empty());
    }
}
