//! Chat-completion endpoint.

use super::*;
use crate::proxy::mappers::models::{ChatMessage, MessageContent};

/// Drop messages with no usable content. A trailing assistant message is kept
/// even when empty: clients use it to prefill the assistant turn.
fn filter_messages(messages: &[ChatMessage]) -> Vec<&ChatMessage> {
    let last_index = messages.len().saturating_sub(1);
    messages
        .iter()
        .enumerate()
        .filter(|(i, msg)| msg.has_content() || (*i == last_index && msg.role == "assistant"))
        .map(|(_, msg)| msg)
        .collect()
}

pub async fn handle_chat_completions(
    State(state): State<AppState>,
    Json(req): Json<CompletionRequest>,
) -> Result<Response, AppError> {
    let model = resolve_model(&state.registry, req.model.as_deref());
    info!("handling /v1/chat/completions for model {}", model.alias);

    let filtered = filter_messages(&req.messages);
    if !filtered.iter().any(|m| m.role == "user" && m.has_content()) {
        return Err(AppError::Validation(
            "At least one user message with content is required".to_string(),
        ));
    }

    let messages: Vec<BackendMessage> = filtered
        .iter()
        .map(|m| BackendMessage {
            role: m.role.clone(),
            content: serde_json::to_value(&m.content).unwrap_or(Value::Null),
        })
        .collect();
    let normalized =
        build_invocation(&req, messages, model.thinking_capable, model.beta_capable, &state.config);

    if req.stream {
        let frames = dispatch_stream(&state, &model.backend_id, &normalized.body).await?;
        let sse = create_sse_stream(frames, model.alias, SseFlavor::Chat);
        return Ok(sse_response(sse));
    }

    let payload = dispatch_invoke(&state, &model.backend_id, &normalized.body).await?;
    let result = translate_response(payload, normalized.thinking_enabled);
    debug!("backend payload for chat completion: {}", result.raw);

    let prompt_text = req
        .messages
        .iter()
        .filter_map(|m| m.content.as_ref())
        .map(MessageContent::text_content)
        .collect::<Vec<_>>()
        .join(" ");
    let prompt_tokens = count_tokens(&prompt_text);
    let completion_tokens = count_tokens(&result.text);
    let thinking_tokens = result.thinking.as_deref().map(count_tokens).unwrap_or(0);

    let created_ms = Utc::now().timestamp_millis();
    let mut response = json!({
        "id": format!("chatcmpl-{}", created_ms),
        "object": "chat.completion",
        "created": created_ms / 1000,
        "model": model.alias,
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": result.text
            },
            "finish_reason": result.stop_reason
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens + thinking_tokens
        }
    });
    if let Some(thinking) = &result.thinking {
        attach_thinking(&mut response, thinking, thinking_tokens);
    }

    Ok(Json(response).into_response())
}
