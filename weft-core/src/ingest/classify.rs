//! Record classification
//!
//! Maps a decoded [`RawRecord`] to one of the closed set of
//! [`ClassifiedMessage`] variants, or to nothing for bookkeeping records.
//!
//! | Record | Result |
//! |--------|--------|
//! | `user`, plain text | `User` (after sanitation) |
//! | `user`, only `tool_result` blocks, or `isMeta` | `Ai` tool echo |
//! | `user`, `<teammate-message>` wrapper | `Teammate` |
//! | `user`, `isCompactSummary` | `Compact` |
//! | `assistant` | `Ai` |
//! | `system` | `System` (bookkeeping subtypes dropped) |
//! | `summary` | `Compact` |
//! | `file-history-snapshot`, anything else | dropped |

use super::record::{tool_result_text, RawBlock, RawContent, RawRecord};
use super::sanitize::{sanitize_user_text, UserText};
use crate::types::{ClassifiedMessage, ContentBlock, Usage};
use chrono::{DateTime, Utc};

/// Which kind of log a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The session's own log. Side-chain records here are copies of
    /// sidecar content and are skipped.
    Parent,
    /// A child session's sidecar log, where every record may be side-chain.
    Sidecar,
}

/// System subtypes that carry no conversational content.
const BOOKKEEPING_SUBTYPES: [&str; 3] = ["turn_duration", "compact_boundary", "stop_hook_summary"];

/// Model name the assistant writes for locally synthesized responses.
const SYNTHETIC_MODEL: &str = "<synthetic>";

/// Classify one record.
///
/// `fallback` is used as the timestamp when the record has none (callers
/// pass the last timestamp they saw).
pub fn classify(
    record: &RawRecord,
    origin: Origin,
    fallback: DateTime<Utc>,
) -> Option<ClassifiedMessage> {
    if origin == Origin::Parent && record.sidechain() {
        return None;
    }

    let timestamp = record.parsed_timestamp().unwrap_or(fallback);

    match record.kind() {
        "user" => classify_user(record, timestamp),
        "assistant" => classify_assistant(record, timestamp),
        "system" => classify_system(record, timestamp),
        "summary" => record
            .summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| ClassifiedMessage::Compact {
                summary_text: s.to_string(),
                timestamp,
            }),
        // file-history-snapshot, queue-operation, progress, ...
        _ => None,
    }
}

fn classify_user(record: &RawRecord, timestamp: DateTime<Utc>) -> Option<ClassifiedMessage> {
    let content = record.message.as_ref()?.content.as_ref()?;

    if record.compact_summary() {
        let text = match content {
            RawContent::Text(text) => text.trim().to_string(),
            RawContent::Blocks(blocks) => join_text_blocks(blocks),
        };
        return (!text.is_empty()).then_some(ClassifiedMessage::Compact {
            summary_text: text,
            timestamp,
        });
    }

    match content {
        RawContent::Text(text) => {
            if record.meta() {
                return None;
            }
            classify_user_text(text, timestamp)
        }
        RawContent::Blocks(blocks) => {
            let results: Vec<ContentBlock> = blocks
                .iter()
                .filter_map(|block| match block {
                    RawBlock::ToolResult {
                        tool_use_id: Some(tool_use_id),
                        content,
                        is_error,
                    } => Some(ContentBlock::ToolResult {
                        tool_use_id: tool_use_id.clone(),
                        content: tool_result_text(content),
                        is_error: is_error.unwrap_or(false),
                    }),
                    _ => None,
                })
                .collect();

            if !results.is_empty() || record.meta() {
                // Tool-result echo: belongs to the assistant's turn.
                if results.is_empty() {
                    return None;
                }
                return Some(ClassifiedMessage::Ai {
                    blocks: results,
                    model: None,
                    usage: None,
                    duration_hint: None,
                    timestamp,
                    tool_echo: true,
                    agent_ref: record.agent_ref(),
                });
            }

            let mut text = join_text_blocks(blocks);
            let images = blocks
                .iter()
                .filter(|b| matches!(b, RawBlock::Image))
                .count();
            for _ in 0..images {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str("[image]");
            }
            classify_user_text(&text, timestamp)
        }
    }
}

fn classify_user_text(text: &str, timestamp: DateTime<Utc>) -> Option<ClassifiedMessage> {
    match sanitize_user_text(text) {
        UserText::Human(text) => Some(ClassifiedMessage::User { text, timestamp }),
        UserText::CommandOutput(text) => Some(ClassifiedMessage::System {
            text,
            is_error: false,
            timestamp,
        }),
        UserText::Teammate { sender_id, text } => Some(ClassifiedMessage::Teammate {
            sender_id,
            text,
            timestamp,
        }),
        UserText::Noise => None,
    }
}

fn join_text_blocks(blocks: &[RawBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| block.text().map(str::trim))
        .collect::<Vec<_>>()
        .join("\n")
}

fn classify_assistant(record: &RawRecord, timestamp: DateTime<Utc>) -> Option<ClassifiedMessage> {
    let msg = record.message.as_ref()?;

    let blocks: Vec<ContentBlock> = match msg.content.as_ref()? {
        RawContent::Text(text) if text.trim().is_empty() => Vec::new(),
        RawContent::Text(text) => vec![ContentBlock::Text { text: text.clone() }],
        RawContent::Blocks(raw) => raw
            .iter()
            .filter_map(|block| match block {
                RawBlock::Text { .. } => block.text().map(|text| ContentBlock::Text {
                    text: text.to_string(),
                }),
                RawBlock::Thinking { thinking } => Some(ContentBlock::Thinking {
                    thinking: thinking.clone().unwrap_or_default(),
                }),
                RawBlock::RedactedThinking => Some(ContentBlock::Thinking {
                    thinking: String::new(),
                }),
                RawBlock::ToolUse {
                    id: Some(id),
                    name: Some(name),
                    input,
                } => Some(ContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                // Images, stray tool results and unknown blocks have no
                // place in an assistant chunk.
                _ => None,
            })
            .collect(),
    };

    if blocks.is_empty() {
        return None;
    }

    let model = msg
        .model
        .as_deref()
        .filter(|m| !m.is_empty() && *m != SYNTHETIC_MODEL)
        .map(str::to_string);

    Some(ClassifiedMessage::Ai {
        blocks,
        model,
        usage: msg.usage.as_ref().map(Usage::from),
        duration_hint: record.duration_hint(),
        timestamp,
        tool_echo: false,
        agent_ref: None,
    })
}

fn classify_system(record: &RawRecord, timestamp: DateTime<Utc>) -> Option<ClassifiedMessage> {
    if let Some(subtype) = record.subtype.as_deref() {
        if BOOKKEEPING_SUBTYPES.contains(&subtype) {
            return None;
        }
    }

    let text = record.system_text()?;
    Some(ClassifiedMessage::System {
        text: text.trim().to_string(),
        is_error: record.level.as_deref() == Some("error"),
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::record::decode_line;

    fn classify_line(line: &str, origin: Origin) -> Option<ClassifiedMessage> {
        let record = decode_line(line).expect("test line must decode");
        classify(&record, origin, DateTime::<Utc>::default())
    }

    #[test]
    fn test_user_text() {
        let msg = classify_line(
            r#"{"type":"user","timestamp":"2025-06-01T10:00:00Z","message":{"role":"user","content":"hello there"}}"#,
            Origin::Parent,
        );
        match msg {
            Some(ClassifiedMessage::User { text, timestamp }) => {
                assert_eq!(text, "hello there");
                assert_eq!(timestamp.to_rfc3339(), "2025-06-01T10:00:00+00:00");
            }
            other => panic!("expected user message, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_result_user_record_is_echo() {
        let msg = classify_line(
            r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"toolu_1","content":"ok"}]},"toolUseResult":{"agentId":"a1b2"}}"#,
            Origin::Parent,
        );
        match msg {
            Some(ClassifiedMessage::Ai {
                blocks,
                tool_echo,
                agent_ref,
                usage,
                ..
            }) => {
                assert!(tool_echo);
                assert!(usage.is_none());
                assert_eq!(agent_ref.as_deref(), Some("a1b2"));
                assert_eq!(
                    blocks,
                    vec![ContentBlock::ToolResult {
                        tool_use_id: "toolu_1".to_string(),
                        content: "ok".to_string(),
                        is_error: false,
                    }]
                );
            }
            other => panic!("expected tool echo, got {:?}", other),
        }
    }

    #[test]
    fn test_meta_user_record_is_not_a_human_turn() {
        assert!(classify_line(
            r#"{"type":"user","isMeta":true,"message":{"role":"user","content":"Caveat: local commands"}}"#,
            Origin::Parent,
        )
        .is_none());

        let echo = classify_line(
            r#"{"type":"user","isMeta":true,"message":{"role":"user","content":[{"type":"text","text":"note"},{"type":"tool_result","tool_use_id":"t","content":"x"}]}}"#,
            Origin::Parent,
        );
        assert!(matches!(
            echo,
            Some(ClassifiedMessage::Ai {
                tool_echo: true,
                ..
            })
        ));
    }

    #[test]
    fn test_teammate_message() {
        let msg = classify_line(
            r#"{"type":"user","message":{"role":"user","content":"<teammate-message teammate_id=\"bob@blue\">done</teammate-message>"}}"#,
            Origin::Parent,
        );
        assert_eq!(
            msg,
            Some(ClassifiedMessage::Teammate {
                sender_id: "bob@blue".to_string(),
                text: "done".to_string(),
                timestamp: DateTime::<Utc>::default(),
            })
        );
    }

    #[test]
    fn test_assistant_blocks() {
        let msg = classify_line(
            r#"{"type":"assistant","durationMs":1200,"message":{"role":"assistant","model":"claude-opus-4","content":[{"type":"thinking","thinking":"hmm"},{"type":"text","text":"Let me look."},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"a.rs"}},{"type":"image","source":{}}],"usage":{"input_tokens":3,"output_tokens":4}}}"#,
            Origin::Parent,
        );
        match msg {
            Some(ClassifiedMessage::Ai {
                blocks,
                model,
                usage,
                duration_hint,
                tool_echo,
                ..
            }) => {
                assert_eq!(blocks.len(), 3);
                assert_eq!(model.as_deref(), Some("claude-opus-4"));
                assert_eq!(usage.unwrap().output_tokens, 4);
                assert_eq!(duration_hint, Some(1200));
                assert!(!tool_echo);
            }
            other => panic!("expected ai message, got {:?}", other),
        }
    }

    #[test]
    fn test_synthetic_empty_assistant_dropped() {
        assert!(classify_line(
            r#"{"type":"assistant","message":{"model":"<synthetic>","content":[]}}"#,
            Origin::Parent,
        )
        .is_none());
    }

    #[test]
    fn test_system_records() {
        let err = classify_line(
            r#"{"type":"system","level":"error","content":"API Error: overloaded"}"#,
            Origin::Parent,
        );
        assert!(matches!(
            err,
            Some(ClassifiedMessage::System { is_error: true, .. })
        ));

        assert!(classify_line(
            r#"{"type":"system","subtype":"turn_duration","durationMs":5000}"#,
            Origin::Parent,
        )
        .is_none());
    }

    #[test]
    fn test_summary_and_compact_summary() {
        let summary = classify_line(r#"{"type":"summary","summary":"Refactor parser"}"#, Origin::Parent);
        assert!(matches!(summary, Some(ClassifiedMessage::Compact { ref summary_text, .. }) if summary_text == "Refactor parser"));

        let compact = classify_line(
            r#"{"type":"user","isCompactSummary":true,"message":{"role":"user","content":"This session is being continued..."}}"#,
            Origin::Parent,
        );
        assert!(matches!(compact, Some(ClassifiedMessage::Compact { .. })));
    }

    #[test]
    fn test_bookkeeping_dropped() {
        assert!(classify_line(
            r#"{"type":"file-history-snapshot","messageId":"m","snapshot":{}}"#,
            Origin::Parent,
        )
        .is_none());
        assert!(classify_line(r#"{"type":"queue-operation"}"#, Origin::Parent).is_none());
    }

    #[test]
    fn test_sidechain_filtered_only_in_parent() {
        let line = r#"{"type":"user","isSidechain":true,"message":{"role":"user","content":"sub task"}}"#;
        assert!(classify_line(line, Origin::Parent).is_none());
        assert!(matches!(
            classify_line(line, Origin::Sidecar),
            Some(ClassifiedMessage::User { .. })
        ));
    }

    #[test]
    fn test_missing_timestamp_uses_fallback() {
        let record = decode_line(r#"{"type":"user","message":{"content":"hi"}}"#).unwrap();
        let fallback = DateTime::parse_from_rfc3339("2025-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let msg = classify(&record, Origin::Parent, fallback).unwrap();
        assert_eq!(msg.timestamp(), fallback);
    }

    #[test]
    fn test_incomplete_block_dropped_rest_of_turn_kept() {
        let msg = classify_line(
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":null,"name":"Bash","input":{}},{"type":"text","text":"done"},{"type":"tool_use","id":"toolu_9","name":"Read","input":{}}]}}"#,
            Origin::Parent,
        );
        match msg {
            Some(ClassifiedMessage::Ai { blocks, .. }) => {
                assert_eq!(blocks.len(), 2);
                assert_eq!(
                    blocks[0],
                    ContentBlock::Text {
                        text: "done".to_string()
                    }
                );
                assert!(matches!(&blocks[1], ContentBlock::ToolUse { id, .. } if id == "toolu_9"));
            }
            other => panic!("expected assistant message, got {:?}", other),
        }
    }
}
