// Model catalog listing
use super::*;

pub async fn handle_list_models(State(state): State<AppState>) -> impl IntoResponse {
    let created = Utc::now().timestamp();
    let data: Vec<_> = state
        .registry
        .list()
        .map(|entry| {
            json!({
                "id": entry.alias,
                "object": "model",
                "created": created,
                "owned_by": "anthropic"
            })
        })
        .collect();

    Json(json!({
        "object": "list",
        "data": data
    }))
}
