//! Streaming translation: backend event frames in, OpenAI SSE frames out.
//!
//! The backend delivers newline-delimited JSON frames over a chunked byte
//! stream. Frames are classified into [`StreamEvent`]s by an explicit parse
//! chain (typed frames first, then the legacy untagged shape) and re-emitted
//! as `data: <json>\n\n` frames in arrival order, terminated by a single
//! `data: [DONE]\n\n` sentinel. Unknown frame types are ignored. A mid-stream
//! backend failure ends the sequence; already-sent frames are never
//! retracted and no trailing error frame is guaranteed.

use async_stream::stream;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::pin::Pin;
use tracing::{debug, warn};

const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Which OpenAI surface the SSE frames are shaped for.
///
/// The two surfaces map the backend stop reason differently: chat translates
/// `end_turn` to `stop`, completions passes the raw reason through. That
/// asymmetry is part of the observed protocol, not an accident to fix here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseFlavor {
    Chat,
    Completions,
}

/// Classified backend stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    ThinkingDelta(String),
    StopSignal(String),
    /// Untagged frame from the older single-shape protocol: a text delta and
    /// possibly the finish signal in one frame.
    LegacyDelta { text: String, stop_reason: Option<String> },
    Unrecognized,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum TaggedFrame {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: BlockDelta },
    #[serde(rename = "message_delta")]
    MessageDelta { delta: MessageDeltaBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum BlockDelta {
    #[serde(rename = "thinking_delta")]
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    #[serde(rename = "text_delta")]
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyFrame {
    #[serde(default)]
    delta: LegacyDeltaBody,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyDeltaBody {
    #[serde(default)]
    text: String,
}

/// Classify one parsed backend frame.
#[must_use]
pub fn classify_frame(raw: &Value) -> StreamEvent {
    if raw.get("type").is_some() {
        return match serde_json::from_value::<TaggedFrame>(raw.clone()) {
            Ok(TaggedFrame::ContentBlockDelta { delta }) => match delta {
                BlockDelta::Thinking { thinking } => StreamEvent::ThinkingDelta(thinking),
                BlockDelta::Text { text } => StreamEvent::TextDelta(text),
                BlockDelta::Other => StreamEvent::Unrecognized,
            },
            Ok(TaggedFrame::MessageDelta { delta }) => match delta.stop_reason {
                Some(reason) => StreamEvent::StopSignal(reason),
                None => StreamEvent::Unrecognized,
            },
            Ok(TaggedFrame::Other) | Err(_) => StreamEvent::Unrecognized,
        };
    }
    match serde_json::from_value::<LegacyFrame>(raw.clone()) {
        Ok(frame) => {
            StreamEvent::LegacyDelta { text: frame.delta.text, stop_reason: frame.stop_reason }
        },
        Err(_) => StreamEvent::Unrecognized,
    }
}

/// Split a chunked byte stream into trimmed lines, including a trailing
/// partial line when the stream ends without a final newline.
fn into_lines<E>(
    mut backend: Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>,
) -> impl Stream<Item = Result<String, String>> + Send
where
    E: std::fmt::Display + Send + 'static,
{
    stream! {
        let mut buffer = BytesMut::new();
        while let Some(item) = backend.next().await {
            match item {
                Ok(bytes) => {
                    buffer.extend_from_slice(&bytes);
                    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                        let line = buffer.split_to(pos + 1);
                        yield Ok(String::from_utf8_lossy(&line).trim().to_string());
                    }
                },
                Err(e) => {
                    yield Err(e.to_string());
                    return;
                },
            }
        }
        if !buffer.is_empty() {
            yield Ok(String::from_utf8_lossy(&buffer).trim().to_string());
        }
    }
}

fn sse_data(value: &Value) -> Bytes {
    Bytes::from(format!("data: {}\n\n", value))
}

fn chat_chunk(id: &str, created: i64, model: &str, delta: Value, finish: Option<&str>) -> Bytes {
    sse_data(&json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": delta,
            "finish_reason": finish
        }]
    }))
}

fn completion_chunk(text: &str, finish: Option<&str>) -> Bytes {
    sse_data(&json!({
        "choices": [{
            "text": text,
            "index": 0,
            "finish_reason": finish
        }]
    }))
}

/// Translate a backend frame stream into OpenAI SSE frames.
///
/// Frames are emitted strictly in backend arrival order; the sequence ends
/// with exactly one `[DONE]` sentinel after the finish signal. The stream is
/// pull-based: when the caller stops polling, production stops.
pub fn create_sse_stream<E>(
    backend: Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>,
    model: String,
    flavor: SseFlavor,
) -> Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>
where
    E: std::fmt::Display + Send + 'static,
{
    // One id and timestamp per response; every chunk of the stream shares it.
    let created_ms = Utc::now().timestamp_millis();
    let created = created_ms / 1000;
    let stream_id = format!("chatcmpl-{}", created_ms);

    let out = stream! {
        let mut lines = Box::pin(into_lines(backend));
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    // Mid-stream failure: stop without retracting sent frames.
                    warn!("backend stream failed mid-flight: {}", e);
                    return;
                },
            };
            if line.is_empty() {
                continue;
            }
            let Ok(frame) = serde_json::from_str::<Value>(&line) else {
                debug!("skipping unparseable stream frame");
                continue;
            };

            match classify_frame(&frame) {
                StreamEvent::ThinkingDelta(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    if flavor == SseFlavor::Chat {
                        yield Ok::<Bytes, String>(chat_chunk(
                            &stream_id,
                            created,
                            &model,
                            json!({"thinking": text}),
                            None,
                        ));
                    }
                },
                StreamEvent::TextDelta(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    let chunk = match flavor {
                        SseFlavor::Chat => chat_chunk(
                            &stream_id,
                            created,
                            &model,
                            json!({"content": text}),
                            None,
                        ),
                        SseFlavor::Completions => completion_chunk(&text, None),
                    };
                    yield Ok(chunk);
                },
                StreamEvent::StopSignal(reason) => {
                    let chunk = match flavor {
                        // Chat maps the backend's end_turn to OpenAI's stop.
                        SseFlavor::Chat => {
                            let finish = if reason == "end_turn" { "stop" } else { reason.as_str() };
                            chat_chunk(&stream_id, created, &model, json!({}), Some(finish))
                        },
                        // Completions passes the raw reason through.
                        SseFlavor::Completions => completion_chunk("", Some(&reason)),
                    };
                    yield Ok(chunk);
                    yield Ok(Bytes::from_static(DONE_FRAME.as_bytes()));
                    return;
                },
                StreamEvent::LegacyDelta { text, stop_reason } => {
                    if !text.is_empty() {
                        let chunk = match flavor {
                            SseFlavor::Chat => chat_chunk(
                                &stream_id,
                                created,
                                &model,
                                json!({"content": text}),
                                stop_reason.as_deref(),
                            ),
                            SseFlavor::Completions => {
                                completion_chunk(&text, stop_reason.as_deref())
                            },
                        };
                        yield Ok(chunk);
                    }
                    if stop_reason.is_some() {
                        yield Ok(Bytes::from_static(DONE_FRAME.as_bytes()));
                        return;
                    }
                },
                StreamEvent::Unrecognized => {},
            }
        }
    };

    Box::pin(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn byte_stream(
        chunks: Vec<&str>,
    ) -> Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>> {
        let owned: Vec<Result<Bytes, std::io::Error>> =
            chunks.into_iter().map(|c| Ok(Bytes::from(c.to_string()))).collect();
        Box::pin(stream::iter(owned))
    }

    async fn collect_frames(
        sse: Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>,
    ) -> Vec<String> {
        let bytes: Vec<Bytes> = sse.map(|r| r.unwrap()).collect().await;
        let text = bytes.iter().map(|b| String::from_utf8_lossy(b).to_string()).collect::<String>();
        text.split("\n\n")
            .filter(|f| !f.is_empty())
            .map(|f| f.trim_start_matches("data: ").to_string())
            .collect()
    }

    #[test]
    fn test_classify_typed_frames() {
        let thinking = json!({"type": "content_block_delta", "delta": {"type": "thinking_delta", "thinking": "hmm"}});
        assert_eq!(classify_frame(&thinking), StreamEvent::ThinkingDelta("hmm".to_string()));

        let text = json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "hi"}});
        assert_eq!(classify_frame(&text), StreamEvent::TextDelta("hi".to_string()));

        let stop = json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}});
        assert_eq!(classify_frame(&stop), StreamEvent::StopSignal("end_turn".to_string()));

        let unknown = json!({"type": "content_block_start", "content_block": {}});
        assert_eq!(classify_frame(&unknown), StreamEvent::Unrecognized);
    }

    #[test]
    fn test_classify_legacy_frame() {
        let legacy = json!({"delta": {"text": "chunk"}, "stop_reason": null});
        assert_eq!(
            classify_frame(&legacy),
            StreamEvent::LegacyDelta { text: "chunk".to_string(), stop_reason: None }
        );

        let last = json!({"delta": {"text": "end"}, "stop_reason": "stop_sequence"});
        assert_eq!(
            classify_frame(&last),
            StreamEvent::LegacyDelta {
                text: "end".to_string(),
                stop_reason: Some("stop_sequence".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_chat_stream_order_and_single_done() {
        let backend = byte_stream(vec![
            "{\"type\":\"message_start\",\"message\":{}}\n",
            "{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"thinking_delta\",\"thinking\":\"let me think\"}}\n",
            "{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n",
            "{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\" world\"}}\n",
            "{\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n",
        ]);
        let frames =
            collect_frames(create_sse_stream(backend, "claude-3-7-sonnet-thinking".to_string(), SseFlavor::Chat))
                .await;

        assert_eq!(frames.len(), 5);
        let first: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(first["choices"][0]["delta"]["thinking"], "let me think");
        let second: Value = serde_json::from_str(&frames[1]).unwrap();
        assert_eq!(second["choices"][0]["delta"]["content"], "Hello");
        let third: Value = serde_json::from_str(&frames[2]).unwrap();
        assert_eq!(third["choices"][0]["delta"]["content"], " world");
        let finish: Value = serde_json::from_str(&frames[3]).unwrap();
        assert_eq!(finish["choices"][0]["finish_reason"], "stop");
        assert_eq!(frames[4], "[DONE]");

        // All chunks share the stream id.
        assert_eq!(first["id"], second["id"]);
        assert_eq!(first["object"], "chat.completion.chunk");
    }

    #[tokio::test]
    async fn test_completions_stream_passes_raw_stop_reason() {
        let backend = byte_stream(vec![
            "{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"output\"}}\n",
            "{\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n",
        ]);
        let frames =
            collect_frames(create_sse_stream(backend, "claude-3-7-sonnet".to_string(), SseFlavor::Completions))
                .await;

        assert_eq!(frames.len(), 3);
        let first: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(first["choices"][0]["text"], "output");
        let finish: Value = serde_json::from_str(&frames[1]).unwrap();
        // Documented asymmetry: the raw backend reason, not "stop".
        assert_eq!(finish["choices"][0]["finish_reason"], "end_turn");
        assert_eq!(frames[2], "[DONE]");
    }

    #[tokio::test]
    async fn test_frames_split_across_chunk_boundaries() {
        let backend = byte_stream(vec![
            "{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"te",
            "xt_delta\",\"text\":\"joined\"}}\n{\"type\":\"message_delta\",",
            "\"delta\":{\"stop_reason\":\"end_turn\"}}\n",
        ]);
        let frames =
            collect_frames(create_sse_stream(backend, "claude-3-7-sonnet".to_string(), SseFlavor::Chat)).await;

        assert_eq!(frames.len(), 3);
        let first: Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(first["choices"][0]["delta"]["content"], "joined");
    }

    #[tokio::test]
    async fn test_legacy_frames_translate_and_terminate() {
        let backend = byte_stream(vec![
            "{\"delta\":{\"text\":\"part one\"}}\n",
            "{\"delta\":{\"text\":\"part two\"},\"stop_reason\":\"max_tokens\"}\n",
        ]);
        let frames =
            collect_frames(create_sse_stream(backend, "claude-2".to_string(), SseFlavor::Completions)).await;

        assert_eq!(frames.len(), 3);
        let last_data: Value = serde_json::from_str(&frames[1]).unwrap();
        assert_eq!(last_data["choices"][0]["text"], "part two");
        assert_eq!(last_data["choices"][0]["finish_reason"], "max_tokens");
        assert_eq!(frames[2], "[DONE]");
    }

    #[tokio::test]
    async fn test_empty_deltas_and_unknown_frames_are_skipped() {
        let backend = byte_stream(vec![
            "{\"type\":\"ping\"}\n",
            "{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"\"}}\n",
            "{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"only\"}}\n",
            "{\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n",
        ]);
        let frames =
            collect_frames(create_sse_stream(backend, "claude-3-7-sonnet".to_string(), SseFlavor::Chat)).await;

        // Only the real delta, the finish chunk, and the sentinel survive.
        assert_eq!(frames.len(), 3);
    }

    #[tokio::test]
    async fn test_thinking_deltas_not_surfaced_on_completions() {
        let backend = byte_stream(vec![
            "{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"thinking_delta\",\"thinking\":\"pondering\"}}\n",
            "{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"answer\"}}\n",
            "{\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n",
        ]);
        let frames =
            collect_frames(create_sse_stream(backend, "claude-3-7-sonnet-thinking".to_string(), SseFlavor::Completions))
                .await;

        assert_eq!(frames.len(), 3);
        assert!(!frames.iter().any(|f| f.contains("pondering")));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_without_done() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(
                b"{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"partial\"}}\n",
            )),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let backend: Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>> =
            Box::pin(stream::iter(chunks));
        let frames =
            collect_frames(create_sse_stream(backend, "claude-3-7-sonnet".to_string(), SseFlavor::Chat)).await;

        assert_eq!(frames.len(), 1);
        assert!(!frames.iter().any(|f| f == "[DONE]"));
    }
}
