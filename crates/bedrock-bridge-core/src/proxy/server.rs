//! Axum application state, router, and server wrapper.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::proxy::common::model_registry::ModelRegistry;
use crate::proxy::config::ProxyConfig;
use crate::proxy::handlers;
use crate::proxy::upstream::client::BedrockClient;
use crate::proxy::upstream::retry::RetryPolicy;

/// Shared request-handling state. Everything here is read-only after startup,
/// so clones are cheap and no locking is needed across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub registry: Arc<ModelRegistry>,
    pub backend: Arc<BedrockClient>,
    pub retry_policy: RetryPolicy,
}

impl AppState {
    #[must_use]
    pub fn new(config: ProxyConfig) -> Self {
        let backend = Arc::new(BedrockClient::new(&config));
        Self {
            config: Arc::new(config),
            registry: Arc::new(ModelRegistry::builtin()),
            backend,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Swap in a custom retry policy (tests use a fast one).
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

/// Build the proxy router over the given state.
pub fn build_proxy_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/models", get(handlers::handle_list_models))
        .route("/v1/chat/completions", post(handlers::handle_chat_completions))
        .route("/v1/completions", post(handlers::handle_completions))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, axum::Json(serde_json::json!({"status": "ok"})))
}

/// Configuration for starting the Axum server.
pub struct ServerStartConfig {
    pub host: String,
    pub port: u16,
    pub proxy_config: ProxyConfig,
}

/// Axum server instance.
pub struct AxumServer {
    config: ServerStartConfig,
}

impl AxumServer {
    #[must_use]
    pub fn new(config: ServerStartConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        tracing::info!("Starting Axum server on {}", addr);

        let state = AppState::new(self.config.proxy_config);
        let app = build_proxy_router(state);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
