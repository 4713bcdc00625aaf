//! Legacy text-completion endpoint.

use super::*;

pub async fn handle_completions(
    State(state): State<AppState>,
    Json(req): Json<CompletionRequest>,
) -> Result<Response, AppError> {
    let prompt = req.prompt.clone().unwrap_or_default();
    if prompt.trim().is_empty() {
        return Err(AppError::Validation("Prompt cannot be empty".to_string()));
    }

    let model = resolve_model(&state.registry, req.model.as_deref());
    info!("handling /v1/completions for model {}", model.alias);

    let messages = vec![BackendMessage::user_text(prompt.clone())];
    let normalized =
        build_invocation(&req, messages, model.thinking_capable, model.beta_capable, &state.config);

    if req.stream {
        let frames = dispatch_stream(&state, &model.backend_id, &normalized.body).await?;
        let sse = create_sse_stream(frames, model.alias, SseFlavor::Completions);
        return Ok(sse_response(sse));
    }

    let payload = dispatch_invoke(&state, &model.backend_id, &normalized.body).await?;
    let result = translate_response(payload, normalized.thinking_enabled);
    debug!("backend payload for completion: {}", result.raw);

    let prompt_tokens = count_tokens(&prompt);
    let completion_tokens = count_tokens(&result.text);
    let thinking_tokens = result.thinking.as_deref().map(count_tokens).unwrap_or(0);

    let created_ms = Utc::now().timestamp_millis();
    let mut response = json!({
        "id": format!("cmpl-{}", created_ms),
        "object": "text_completion",
        "created": created_ms / 1000,
        "model": model.alias,
        "choices": [{
            "text": result.text,
            "index": 0,
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
