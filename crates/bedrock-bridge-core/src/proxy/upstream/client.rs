//! HTTP client for the Bedrock runtime invocation operations.
//!
//! Two operations exist: a single-shot invoke returning one JSON payload and
//! a streaming invoke returning newline-delimited JSON frames over a chunked
//! body. Failures carry an explicit throttling classification so the retry
//! loop never has to inspect error types.

use bytes::Bytes;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::error::AppError;
use crate::proxy::config::ProxyConfig;
use crate::proxy::mappers::models::InvocationRequest;

const THROTTLING_MARKER: &str = "ThrottlingException";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Backend failure with an explicit retry classification.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Transient rate-limit failure, eligible for retry.
    #[error("backend throttled: {0}")]
    Throttled(String),

    /// Any other backend-reported failure.
    #[error("backend returned {code}: {message}")]
    Service { code: u16, message: String },

    /// The request never produced a backend response.
    #[error("backend transport failure: {0}")]
    Transport(String),
}

impl BackendError {
    /// Whether the retry loop may try again.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        matches!(self, BackendError::Throttled(_))
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Throttled(message) => {
                AppError::Backend { code: THROTTLING_MARKER.to_string(), message }
            },
            BackendError::Service { code, message } => {
                AppError::Backend { code: format!("HTTP {}", code), message }
            },
            BackendError::Transport(message) => {
                AppError::Backend { code: "transport".to_string(), message }
            },
        }
    }
}

/// Byte stream of backend frames.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Client for the Bedrock runtime HTTP surface.
pub struct BedrockClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl BedrockClient {
    /// Build a client from process configuration.
    ///
    /// # Panics
    /// Panics if the TLS backend cannot be initialized; that happens once at
    /// startup, never per request.
    #[must_use]
    pub fn new(config: &ProxyConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("HTTP client construction cannot fail with static configuration");
        Self {
            http,
            base_url: config.backend_base_url.trim_end_matches('/').to_string(),
            api_key: config.backend_api_key.clone(),
        }
    }

    fn endpoint(&self, model_id: &str, operation: &str) -> String {
        format!("{}/model/{}/{}", self.base_url, model_id, operation)
    }

    fn request(&self, url: &str, body: &InvocationRequest) -> reqwest::RequestBuilder {
        let mut builder = self.http.post(url).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Classify a non-success response. HTTP 429 and anything carrying the
    /// throttling marker count as throttled; everything else is a plain
    /// service failure.
    async fn classify_failure(response: reqwest::Response) -> BackendError {
        let code = response.status().as_u16();
        let message = response.text().await.unwrap_or_else(|_| format!("HTTP {}", code));
        if code == 429 || message.contains(THROTTLING_MARKER) {
            BackendError::Throttled(message)
        } else {
            BackendError::Service { code, message }
        }
    }

    /// Single-shot invocation: one request, one completed JSON payload.
    pub async fn invoke(
        &self,
        model_id: &str,
        body: &InvocationRequest,
    ) -> Result<Value, BackendError> {
        let url = self.endpoint(model_id, "invoke");
        debug!("invoking backend model {}", model_id);
        let response = self
            .request(&url, body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }
        response.json().await.map_err(|e| BackendError::Transport(e.to_string()))
    }

    /// Streaming invocation: one request, a chunked stream of event frames.
    ///
    /// Only establishing the stream is fallible here; once bytes flow, errors
    /// surface through the stream itself and are not retried.
    pub async fn invoke_stream(
        &self,
        model_id: &str,
        body: &InvocationRequest,
    ) -> Result<FrameStream, BackendError> {
        let url = self.endpoint(model_id, "invoke-with-response-stream");
        debug!("opening backend stream for model {}", model_id);
        let response = self
            .request(&url, body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }
        Ok(Box::pin(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_throttled_is_retryable() {
        assert!(BackendError::Throttled("rate".to_string()).is_throttled());
        assert!(!BackendError::Service { code: 500, message: "boom".to_string() }.is_throttled());
        assert!(!BackendError::Transport("refused".to_string()).is_throttled());
    }

    #[test]
    fn test_backend_error_converts_to_app_error() {
        let err: AppError =
            BackendError::Service { code: 503, message: "overloaded".to_string() }.into();
        assert!(err.to_string().contains("HTTP 503"));
        assert!(err.to_string().contains("overloaded"));
    }
}
