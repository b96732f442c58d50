use async_trait::async_trait;
use futures::Stream;
use std::fmt::Debug;
use std::pin::Pin;

use super::{ChatRequest, StreamChunk};
use crate::domain::StreamError;

/// Stream type for streamed completions
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, StreamError>> + Send>>;

/// Anything that can turn a chat request into a stream of chunks
#[async_trait]
pub trait CompletionStreamer: Send + Sync + Debug {
    /// Open a streamed chat completion
    async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, StreamError>;

    /// Model used when the request carries no override
    fn default_model(&self) -> &str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use futures::stream;

    /// Replays a fixed list of payloads, optionally ending in an error
    #[derive(Debug, Default)]
    pub struct MockCompletionStreamer {
        payloads: Vec<String>,
        trailing_error: Option<String>,
    }

    impl MockCompletionStreamer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
            self.payloads.push(payload.to_string());
            self
        }

        pub fn with_delta(self, text: &str) -> Self {
            self.with_payload(serde_json::json!({
                "id": "mock",
                "model": "mock-model",
                "choices": [{ "index": 0, "delta": { "content": text }, "finish_reason": null }]
            }))
        }

        pub fn with_interruption(mut self, message: impl Into<String>) -> Self {
            self.trailing_error = Some(message.into());
            self
        }
    }

    #[async_trait]
    impl CompletionStreamer for MockCompletionStreamer {
        async fn stream_chat(&self, request: ChatRequest) -> Result<ChunkStream, StreamError> {
            request.validate()?;

            let mut items: Vec<Result<StreamChunk, StreamError>> = self
                .payloads
                .iter()
                .map(|p| {
                    StreamChunk::from_data(p.clone())
                        .map_err(|e| StreamError::protocol(e.to_string()))
                })
                .collect();

            if let Some(ref message) = self.trailing_error {
                items.push(Err(StreamError::interrupted(self.payloads.len(), message)));
            }

            Ok(Box::pin(stream::iter(items)))
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }
    }
}
