//! Domain layer - Messages, requests, chunks and errors

pub mod error;
pub mod llm;

pub use error::StreamError;
pub use llm::{
    ChatRequest, ChatRequestBuilder, ChunkStream, CompletionStreamer, FinishReason, Message,
    MessageRole, StreamChunk, Usage,
};
