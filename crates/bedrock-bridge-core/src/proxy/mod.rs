//! Proxy module - OpenAI-compatible front end over the Bedrock Claude runtime.
//!
//! Flow: inbound request → model registry resolves the backend id → the
//! request mapper builds a validated invocation body (thinking normalization
//! included) → the resilient invoker dispatches it → the response or stream
//! translator converts the result → token accounting fills in usage.

pub mod common;
pub mod config;
pub mod handlers;
pub mod mappers;
pub mod server;
pub mod upstream;

pub use common::model_registry::{ModelAlias, ModelRegistry};
pub use config::ProxyConfig;
pub use server::{build_proxy_router, AppState, AxumServer, ServerStartConfig};
pub use upstream::client::{BackendError, BedrockClient};
pub use upstream::retry::{invoke_with_retry, RetryPolicy};
