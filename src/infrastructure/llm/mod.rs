//! Streaming chat completion client

mod http_client;
mod sse;
mod streaming_client;
mod summary;

pub use http_client::{ByteStream, HttpClient, HttpClientTrait};
pub use sse::{SseDecoder, SseEvent, DONE_MARKER};
pub use streaming_client::{stream_completion, CompletionStream, StreamingCompletionClient};
pub use summary::{summarize, StreamSummary};
