//! Anthropic Claude text generation via the Amazon Bedrock runtime.
//!
//! This library adapts Bedrock's invoke-model protocol, buffered or streamed,
//! into a single generation interface: build the request payload, invoke the
//! runtime, decode once or chunk by chunk, and hand back normalized
//! generations. Retry policy, prompt templating and credential resolution are
//! deliberately left to the caller.

pub mod callbacks;
pub mod codec;
pub mod error;
pub mod llm;
pub mod options;
pub mod reducer;
pub mod sse_stream;
pub mod transport;

// Re-export core types for easy usage
pub use callbacks::CallbackHandler;
pub use codec::{ClaudeRequest, ClaudeResponse, CONTENT_TYPE_JSON};
pub use error::Error;
pub use llm::{Claude, ClaudeBuilder, Generation, LanguageModel, CLAUDE_V2_MODEL_ID};
pub use options::{CallOptions, StreamingFunc};
pub use sse_stream::SseEvent;
pub use transport::{BedrockRuntime, BedrockRuntimeClient, EventSource, ResponseStreamEvent};
