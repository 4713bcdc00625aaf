// OpenAI-compatible API handlers.
//
// Both POST endpoints feed the same resolution -> normalization -> dispatch
// pipeline; only message assembly and response shaping differ per surface.

mod chat;
mod completions;
mod models;

pub use chat::handle_chat_completions;
pub use completions::handle_completions;
pub use models::handle_list_models;

// Shared imports for submodules
use axum::body::Body;
use axum::extract::{Json, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use serde_json::{json, Value};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::AppError;
use crate::proxy::common::model_registry::ModelRegistry;
use crate::proxy::common::token_count::count_tokens;
use crate::proxy::mappers::models::{BackendMessage, InvocationRequest};
use crate::proxy::mappers::{
    build_invocation, create_sse_stream, translate_response, CompletionRequest, SseFlavor,
};
use crate::proxy::server::AppState;
use crate::proxy::upstream::client::FrameStream;
use crate::proxy::upstream::retry::invoke_with_retry;

pub(crate) const DEFAULT_MODEL_ALIAS: &str = "claude-3-7-sonnet";

/// Routing facts resolved once per request.
pub(crate) struct ResolvedModel {
    pub alias: String,
    pub backend_id: String,
    pub thinking_capable: bool,
    pub beta_capable: bool,
}

pub(crate) fn resolve_model(registry: &ModelRegistry, requested: Option<&str>) -> ResolvedModel {
    let alias = requested.unwrap_or(DEFAULT_MODEL_ALIAS).to_string();
    ResolvedModel {
        backend_id: registry.resolve(&alias).to_string(),
        thinking_capable: registry.is_thinking_capable(&alias),
        beta_capable: registry.supports_beta_features(&alias),
        alias,
    }
}

/// Single-shot dispatch through the retry loop.
pub(crate) async fn dispatch_invoke(
    state: &AppState,
    backend_id: &str,
    body: &InvocationRequest,
) -> Result<Value, AppError> {
    let backend = Arc::clone(&state.backend);
    let model_id = backend_id.to_string();
    let body = body.clone();
    invoke_with_retry(state.retry_policy, move || {
        let backend = Arc::clone(&backend);
        let model_id = model_id.clone();
        let body = body.clone();
        async move { backend.invoke(&model_id, &body).await }
    })
    .await
    .map_err(AppError::from)
}

/// Stream-establishing dispatch through the retry loop. Retries stop once the
/// stream exists; mid-stream failures are the translator's concern.
pub(crate) async fn dispatch_stream(
    state: &AppState,
    backend_id: &str,
    body: &InvocationRequest,
) -> Result<FrameStream, AppError> {
    let backend = Arc::clone(&state.backend);
    let model_id = backend_id.to_string();
    let body = body.clone();
    invoke_with_retry(state.retry_policy, move || {
        let backend = Arc::clone(&backend);
        let model_id = model_id.clone();
        let body = body.clone();
        async move { backend.invoke_stream(&model_id, &body).await }
    })
    .await
    .map_err(AppError::from)
}

/// Wrap translated SSE frames in a streaming HTTP response.
pub(crate) fn sse_response(
    stream: Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>,
) -> Response {
    Response::builder()
        .header("Content-Type", "text/event-stream")
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .body(Body::from_stream(stream))
        .expect("valid streaming response")
}

/// Attach the reasoning trace to a finished response object.
pub(crate) fn attach_thinking(response: &mut Value, thinking: &str, thinking_tokens: usize) {
    if let Some(choice) = response
        .pointer_mut("/choices/0")
        .and_then(Value::as_object_mut)
    {
        choice.insert("thinking".to_string(), Value::String(thinking.to_string()));
    }
    if let Some(usage) = response.pointer_mut("/usage").and_then(Value::as_object_mut) {
        usage.insert("thinking_tokens".to_string(), json!(thinking_tokens));
    }
}
