//! # Bedrock Bridge Core
//!
//! OpenAI-compatible translation engine for the AWS Bedrock Claude runtime.
//!
//! ```text
//! bedrock-bridge-core/src/proxy/
//! ├── common/           # model registry, token accounting
//! ├── mappers/          # request normalization + response/stream translation
//! ├── handlers/         # /v1/completions, /v1/chat/completions, /v1/models
//! ├── upstream/         # Bedrock runtime client + retry loop
//! ├── config.rs         # immutable process configuration
//! └── server.rs         # Axum router + server
//! ```

pub mod error;
pub mod proxy;

// Re-export commonly used types
pub use error::{AppError, AppResult};
