//! LLM Stream Client
//!
//! Streams chat completions from OpenAI-compatible endpoints (Ollama, Groq,
//! local proxies) and hands each chunk to the caller as it arrives:
//! - Ordered, lazily pulled chunks over a single connection
//! - Connection, protocol and interruption errors kept apart
//! - Dropping the stream closes the connection

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{AppConfig, EndpointConfig};
pub use domain::{
    ChatRequest, ChatRequestBuilder, FinishReason, Message, MessageRole, StreamChunk, StreamError,
    Usage,
};
pub use infrastructure::llm::{
    stream_completion, summarize, CompletionStream, StreamSummary, StreamingCompletionClient,
};
