//! Chat completion domain models and traits

mod message;
mod provider;
mod request;
mod response;

pub use message::{Message, MessageRole};
pub use provider::{ChunkStream, CompletionStreamer};
pub use request::{ChatRequest, ChatRequestBuilder};
pub use response::{FinishReason, StreamChunk, Usage};

#[cfg(test)]
pub use provider::mock::MockCompletionStreamer;
