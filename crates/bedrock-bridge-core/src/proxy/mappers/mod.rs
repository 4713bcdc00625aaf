// Request/response transformation between the OpenAI surface and the
// Bedrock Claude invocation protocol.

pub mod models;
pub mod request;
pub mod response;
pub mod streaming;

pub use models::{ChatMessage, CompletionRequest, MessageContent, ThinkingConfig};
pub use request::{build_invocation, NormalizedInvocation};
pub use response::{translate_response, InvocationResult};
pub use streaming::{create_sse_stream, SseFlavor, StreamEvent};
