//! Event Parser
//!
//! Recognizes `data:` records, deserializes their JSON payload and classifies
//! it by the `type` field.
//!
//! # Wire Format
//!
//! ```text
//! data: {"type": "thinking", "content": "Analyzing your request..."}
//!
//! data: {"type": "content", "content": "Here are three ", "is_final": false}
//!
//! data: {"type": "metadata", "action": "career_advice", "tools_used": ["career_guides"]}
//!
//! data: {"type": "done"}
//! ```
//!
//! Anything that is not a data record (blank keep-alives, `:` comments,
//! `event:` or `id:` fields) is ignored.

use serde::Deserialize;

use super::event::{StatusKind, StreamEvent};
use crate::conversation::TurnMetadata;

/// Prefix marking a data record
pub const DATA_MARKER: &str = "data:";

/// Outcome of parsing one complete line
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedLine {
    /// Not a data record
    Ignored,
    /// A recognized event
    Event(StreamEvent),
    /// Well-formed payload with a `type` this client does not know
    Unrecognized {
        /// The unknown `type` value
        kind: String,
    },
    /// Data record whose payload could not be deserialized
    Malformed {
        /// Deserializer error text
        error: String,
    },
}

/// Raw JSON payload of a data record
#[derive(Debug, Deserialize)]
struct WirePayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    tools_used: Option<Vec<String>>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    format: Option<String>,
}

impl WirePayload {
    fn into_parsed(self) -> ParsedLine {
        if let Some(kind) = StatusKind::from_wire(&self.kind) {
            return ParsedLine::Event(StreamEvent::Status {
                kind,
                text: self.content.unwrap_or_default(),
            });
        }

        let event = match self.kind.as_str() {
            "content" => StreamEvent::ContentDelta(self.content.unwrap_or_default()),
            "metadata" => StreamEvent::Metadata(TurnMetadata {
                action: self.action,
                tools_used: self.tools_used.unwrap_or_default(),
                reasoning: self.reasoning,
                format: self.format,
            }),
            "error" => StreamEvent::Error(self.content),
            "done" => StreamEvent::Done,
            other => {
                return ParsedLine::Unrecognized {
                    kind: other.to_string(),
                }
            }
        };

        ParsedLine::Event(event)
    }
}

/// Parse one complete line (without its terminator)
#[must_use]
pub fn parse_line(line: &str) -> ParsedLine {
    let Some(rest) = line.strip_prefix(DATA_MARKER) else {
        return ParsedLine::Ignored;
    };
    let payload = rest.strip_prefix(' ').unwrap_or(rest);

    match serde_json::from_str::<WirePayload>(payload) {
        Ok(wire) => wire.into_parsed(),
        Err(e) => ParsedLine::Malformed {
            error: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_non_data_lines_are_ignored() {
        assert_eq!(parse_line(""), ParsedLine::Ignored);
        assert_eq!(parse_line(": keep-alive"), ParsedLine::Ignored);
        assert_eq!(parse_line("event: message"), ParsedLine::Ignored);
        assert_eq!(parse_line("id: 7"), ParsedLine::Ignored);
    }

    #[test]
    fn test_status_kinds() {
        let cases = [
            ("thinking", StatusKind::Thinking),
            ("intent", StatusKind::Intent),
            ("processing", StatusKind::Processing),
            ("tool_call", StatusKind::ToolCall),
            ("tool_result", StatusKind::ToolResult),
            ("llm_processing", StatusKind::LlmProcessing),
        ];

        for (wire, kind) in cases {
            let line = format!(r#"data: {{"type":"{wire}","content":"working"}}"#);
            assert_eq!(
                parse_line(&line),
                ParsedLine::Event(StreamEvent::Status {
                    kind,
                    text: "working".to_string()
                })
            );
        }
    }

    #[test]
    fn test_content_delta_ignores_extra_fields() {
        let parsed = parse_line(r#"data: {"type":"content","content":"Hel","is_final":false}"#);
        assert_eq!(
            parsed,
            ParsedLine::Event(StreamEvent::ContentDelta("Hel".to_string()))
        );
    }

    #[test]
    fn test_marker_without_space() {
        let parsed = parse_line(r#"data:{"type":"done"}"#);
        assert_eq!(parsed, ParsedLine::Event(StreamEvent::Done));
    }

    #[test]
    fn test_metadata_fields() {
        let parsed = parse_line(
            r#"data: {"type":"metadata","action":"resume_analysis_complete","tools_used":["analyze_resume"],"reasoning":"Resume provided","format":"markdown"}"#,
        );
        assert_eq!(
            parsed,
            ParsedLine::Event(StreamEvent::Metadata(TurnMetadata {
                action: Some("resume_analysis_complete".to_string()),
                tools_used: vec!["analyze_resume".to_string()],
                reasoning: Some("Resume provided".to_string()),
                format: Some("markdown".to_string()),
            }))
        );
    }

    #[test]
    fn test_error_event() {
        let parsed = parse_line(r#"data: {"type":"error","content":"rate limited"}"#);
        assert_eq!(
            parsed,
            ParsedLine::Event(StreamEvent::Error(Some("rate limited".to_string())))
        );

        let parsed = parse_line(r#"data: {"type":"error"}"#);
        assert_eq!(parsed, ParsedLine::Event(StreamEvent::Error(None)));
    }

    #[test]
    fn test_unrecognized_kind() {
        let parsed = parse_line(r#"data: {"type":"heartbeat"}"#);
        assert_eq!(
            parsed,
            ParsedLine::Unrecognized {
                kind: "heartbeat".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            parse_line("data: {not json"),
            ParsedLine::Malformed { .. }
        ));
        // Missing the required type field
        assert!(matches!(
            parse_line(r#"data: {"content":"orphan"}"#),
            ParsedLine::Malformed { .. }
        ));
        assert!(matches!(
            parse_line("data: [DONE]"),
            ParsedLine::Malformed { .. }
        ));
    }
}
