use futures::{Stream, StreamExt};

use crate::domain::{FinishReason, StreamChunk, StreamError, Usage};

/// What a finished stream added up to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    text: String,
    chunks: usize,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    model: Option<String>,
}

impl StreamSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in
    pub fn record(&mut self, chunk: &StreamChunk) {
        self.chunks += 1;

        if let Some(delta) = chunk.delta() {
            self.text.push_str(delta);
        }

        if let Some(reason) = chunk.finish_reason() {
            self.finish_reason = Some(reason);
        }

        if let Some(usage) = chunk.usage() {
            self.usage = Some(usage);
        }

        if self.model.is_none() {
            self.model = chunk.model().map(str::to_string);
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn total_tokens(&self) -> Option<u32> {
        self.usage.as_ref().map(|u| u.total_tokens)
    }
}

/// Drain a stream into a summary, stopping at the first error
pub async fn summarize<S>(mut stream: S) -> Result<StreamSummary, StreamError>
where
    S: Stream<Item = Result<StreamChunk, StreamError>> + Unpin,
{
    let mut summary = StreamSummary::new();

    while let Some(chunk) = stream.next().await {
        summary.record(&chunk?);
    }

    Ok(summary)
}
