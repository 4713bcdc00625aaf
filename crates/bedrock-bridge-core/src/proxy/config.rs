//! Process-wide proxy configuration, built once at startup and passed
//! explicitly into the router state. Nothing here mutates after boot.

/// Default output token limit when the client does not send `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Largest output ceiling the Claude 3.7 runtime accepts.
pub const MAX_OUTPUT_TOKENS: u32 = 128_000;

/// Immutable proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Base URL of the Bedrock runtime (overridable for tests and gateways).
    pub backend_base_url: String,
    /// Optional bearer credential forwarded to the backend gateway.
    pub backend_api_key: Option<String>,
    /// Output token limit applied when the client omits `max_tokens`.
    pub default_max_tokens: u32,
    /// Hard cap on the output token ceiling.
    pub max_output_tokens: u32,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            backend_base_url: "https://bedrock-runtime.us-east-1.amazonaws.com".to_string(),
            backend_api_key: None,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }
    }
}

impl ProxyConfig {
    /// Build configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `BRIDGE_BACKEND_URL`, `BRIDGE_BACKEND_API_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("BRIDGE_BACKEND_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if url.is_empty() {
                tracing::warn!("BRIDGE_BACKEND_URL is empty, using default endpoint");
            } else {
                config.backend_base_url = url;
            }
        }
        if let Ok(key) = std::env::var("BRIDGE_BACKEND_API_KEY") {
            if !key.trim().is_empty() {
                config.backend_api_key = Some(key);
            }
        }
        config
    }

    /// Override the backend base URL (used by tests pointing at a mock server).
    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_base_url = url.into();
        self
    }
}
