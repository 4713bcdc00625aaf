//! Wire-level data models for both sides of the bridge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Anthropic protocol revision the Bedrock runtime expects.
pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Inbound OpenAI-style request, shared by `/v1/completions` (legacy
/// `prompt`) and `/v1/chat/completions` (`messages`). Both handlers feed the
/// same normalization pipeline, so one shape covers both surfaces.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRequest {
    /// Public model alias; defaults to "claude-3-7-sonnet" when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Legacy prompt field (completions endpoint).
    #[serde(default)]
    pub prompt: Option<String>,
    /// Conversation messages (chat endpoint).
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Output token ceiling.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Nucleus sampling parameter; stripped whenever reasoning is enabled.
    #[serde(default)]
    pub top_p: Option<f32>,
    /// Stop sequence(s): a single string or a list.
    #[serde(default)]
    pub stop: Option<Value>,
    /// Enable streaming response.
    #[serde(default)]
    pub stream: bool,
    /// Extended-reasoning switch: `true`/`false` or a configuration object
    /// carrying `budget_tokens`.
    #[serde(default)]
    pub thinking: Option<Value>,
    /// Convenience budget fields, honored in this declaration order.
    #[serde(default)]
    pub max_thinking_tokens: Option<Value>,
    #[serde(default)]
    pub thinking_max_tokens: Option<Value>,
    #[serde(default)]
    pub max_thinking_length: Option<Value>,
    /// Opt into the 128K output beta (Claude 3.7 only).
    #[serde(default)]
    pub enable_extended_output: bool,
    /// Opt into the computer-use beta (Claude 3.7 only).
    #[serde(default)]
    pub enable_computer_use: bool,
}

/// Message in an OpenAI conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
}

/// Content in an OpenAI message: plain text or multimodal blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    String(String),
    Array(Vec<ContentPart>),
}

/// One multimodal content part. Non-text parts are carried through to the
/// backend untouched, so only the fields we inspect are modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl MessageContent {
    /// Whether the content carries any usable text. A multimodal list counts
    /// as non-empty if any `text` part has text.
    #[must_use]
    pub fn has_text(&self) -> bool {
        match self {
            MessageContent::String(s) => !s.trim().is_empty(),
            MessageContent::Array(parts) => parts
                .iter()
                .any(|p| p.kind == "text" && p.text.as_deref().is_some_and(|t| !t.is_empty())),
        }
    }

    /// All text carried by the content, concatenated. Used for approximate
    /// token accounting only.
    #[must_use]
    pub fn text_content(&self) -> String {
        match self {
            MessageContent::String(s) => s.clone(),
            MessageContent::Array(parts) => parts
                .iter()
                .filter(|p| p.kind == "text")
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl ChatMessage {
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.content.as_ref().is_some_and(MessageContent::has_text)
    }
}

/// Validated extended-reasoning configuration sent to the backend.
///
/// Invariant (backend-enforced): when present, `1024 <= budget_tokens` and
/// `budget_tokens < max_tokens` of the surrounding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    #[serde(rename = "type")]
    pub kind: ThinkingKind,
    pub budget_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingKind {
    Enabled,
}

impl ThinkingConfig {
    #[must_use]
    pub fn enabled(budget_tokens: u32) -> Self {
        Self { kind: ThinkingKind::Enabled, budget_tokens }
    }
}

/// Message forwarded to the backend. Content passes through as raw JSON so
/// multimodal payloads survive the round trip unmodified.
#[derive(Debug, Clone, Serialize)]
pub struct BackendMessage {
    pub role: String,
    pub content: Value,
}

impl BackendMessage {
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: Value::String(text.into()) }
    }
}

/// Fully validated Bedrock invocation body.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationRequest {
    pub anthropic_version: &'static str,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    pub messages: Vec<BackendMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_beta: Option<Vec<String>>,
}
