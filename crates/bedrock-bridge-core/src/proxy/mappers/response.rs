//! Non-streaming response translation.
//!
//! The backend answers in one of several shapes: the block-list format of the
//! messages API, the legacy single `completion` field, or a bare `content`
//! value. Each shape is modeled explicitly and tried in precedence order
//! rather than probing fields ad hoc.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Completed backend invocation, translated to plain text.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub text: String,
    pub thinking: Option<String>,
    pub stop_reason: String,
    /// Original payload, kept for diagnostics.
    pub raw: Value,
}

/// One block in a messages-API content list. Unknown block types are carried
/// as [`ContentBlock::Unknown`] and skipped during extraction.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopLevelThinking {
    #[serde(default)]
    pub text: String,
}

/// The documented backend payload shapes, in parse precedence order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BackendPayload {
    /// Messages-API shape: a list of typed content blocks.
    Blocks {
        content: Vec<ContentBlock>,
        #[serde(default)]
        thinking: Option<TopLevelThinking>,
        #[serde(default)]
        stop_reason: Option<String>,
    },
    /// Legacy shape: a single `completion` string. A `content` value may
    /// still ride along and acts as the fallback when `completion` is empty.
    Legacy {
        completion: String,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        stop_reason: Option<String>,
    },
    /// Anything else: a bare `content` value of unknown shape.
    Bare {
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        stop_reason: Option<String>,
    },
}

/// Last-resort text extraction from an untyped `content` value: first element
/// of a non-empty list, else the stringified value, else empty.
fn bare_content_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::Array(items)) if !items.is_empty() => items[0]
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    }
}

impl BackendPayload {
    /// Main text, by the documented precedence chain.
    fn text(&self) -> String {
        match self {
            BackendPayload::Blocks { content, .. } => content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            BackendPayload::Legacy { completion, .. } if !completion.is_empty() => {
                completion.clone()
            },
            BackendPayload::Legacy { content, .. } | BackendPayload::Bare { content, .. } => {
                bare_content_text(content.as_ref())
            },
        }
    }

    /// Reasoning trace: the top-level `thinking` object wins, else the
    /// `thinking` blocks of the content list joined by single spaces.
    fn thinking(&self) -> Option<String> {
        let BackendPayload::Blocks { content, thinking, .. } = self else {
            return None;
        };
        if let Some(top) = thinking {
            if !top.text.is_empty() {
                return Some(top.text.clone());
            }
        }
        let joined = content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Thinking { thinking } => Some(thinking.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }

    fn stop_reason(&self) -> Option<&str> {
        match self {
            BackendPayload::Blocks { stop_reason, .. }
            | BackendPayload::Legacy { stop_reason, .. }
            | BackendPayload::Bare { stop_reason, .. } => stop_reason.as_deref(),
        }
    }
}

/// Translate a completed backend payload into an [`InvocationResult`].
///
/// `thinking_enabled` gates reasoning extraction: a request that never asked
/// for reasoning never reports any, whatever the payload carries.
#[must_use]
pub fn translate_response(raw: Value, thinking_enabled: bool) -> InvocationResult {
    let payload: BackendPayload = match serde_json::from_value(raw.clone()) {
        Ok(p) => p,
        Err(e) => {
            warn!("unparseable backend payload ({}), treating as empty", e);
            BackendPayload::Bare { content: None, stop_reason: None }
        },
    };

    let text = payload.text();
    let thinking = if thinking_enabled {
        let extracted = payload.thinking();
        match &extracted {
            Some(t) => debug!("extracted reasoning trace: {} chars", t.len()),
            None => warn!("reasoning was enabled but the payload carried no thinking content"),
        }
        extracted
    } else {
        None
    };
    let stop_reason = payload.stop_reason().unwrap_or("stop").to_string();

    InvocationResult { text, thinking, stop_reason, raw }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_list_payload_concatenates_text() {
        let payload = json!({
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "tool_use", "id": "t1", "name": "calc", "input": {}},
                {"type": "text", "text": "world"}
            ],
            "stop_reason": "end_turn"
        });
        let result = translate_response(payload, false);
        assert_eq!(result.text, "Hello world");
        assert_eq!(result.stop_reason, "end_turn");
        assert!(result.thinking.is_none());
    }

    #[test]
    fn test_legacy_completion_payload() {
        let payload = json!({"completion": "Once upon a time", "stop_reason": "stop_sequence"});
        let result = translate_response(payload, false);
        assert_eq!(result.text, "Once upon a time");
        assert_eq!(result.stop_reason, "stop_sequence");
    }

    #[test]
    fn test_empty_completion_falls_back_to_content_list() {
        let payload = json!({"completion": "", "content": [{"text": "fallback"}]});
        let result = translate_response(payload, false);
        assert_eq!(result.text, "fallback");
        assert_eq!(result.stop_reason, "stop");
    }

    #[test]
    fn test_bare_string_content() {
        let payload = json!({"content": "plain answer"});
        let result = translate_response(payload, false);
        assert_eq!(result.text, "plain answer");
    }

    #[test]
    fn test_missing_content_yields_empty_text() {
        let result = translate_response(json!({}), false);
        assert_eq!(result.text, "");
        assert_eq!(result.stop_reason, "stop");
    }

    #[test]
    fn test_top_level_thinking_wins() {
        let payload = json!({
            "content": [
                {"type": "thinking", "thinking": "from blocks"},
                {"type": "text", "text": "answer"}
            ],
            "thinking": {"text": "from top level"}
        });
        let result = translate_response(payload, true);
        assert_eq!(result.thinking.as_deref(), Some("from top level"));
        assert_eq!(result.text, "answer");
    }

    #[test]
    fn test_thinking_blocks_joined_with_spaces() {
        let payload = json!({
            "content": [
                {"type": "thinking", "thinking": "first"},
                {"type": "text", "text": "answer"},
                {"type": "thinking", "thinking": "second"}
            ]
        });
        let result = translate_response(payload, true);
        assert_eq!(result.thinking.as_deref(), Some("first second"));
    }

    #[test]
    fn test_thinking_suppressed_when_not_requested() {
        let payload = json!({
            "content": [{"type": "thinking", "thinking": "trace"}, {"type": "text", "text": "a"}]
        });
        let result = translate_response(payload, false);
        assert!(result.thinking.is_none());
    }

    #[test]
    fn test_absent_thinking_is_not_an_error() {
        let payload = json!({"content": [{"type": "text", "text": "answer"}]});
        let result = translate_response(payload, true);
        assert!(result.thinking.is_none());
        assert_eq!(result.text, "answer");
    }
}
